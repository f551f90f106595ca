use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use glsltex::{
    time_source, FsDocumentStore, IntervalClock, PngImageStore, Session, SessionParams, TimeMode,
};
use renderer::{GpuRenderer, RendererConfig};
use sessionconfig::{SessionConfig, DEFAULT_FPS};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::bootstrap_filesystem;
use crate::cli::{HostArgs, RunArgs, TimeArg};
use crate::paths::AppPaths;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = args
        .config
        .as_deref()
        .map(load_session_config)
        .transpose()?;
    let sessions = build_sessions(session_params(&args, config.as_ref()))?;

    let root = match (&args.host.root, &args.config) {
        (Some(root), _) => absolute(root)?,
        (None, Some(config_path)) => absolute(config_path.parent().unwrap_or(Path::new("")))?,
        (None, None) => env::current_dir().context("failed to read current directory")?,
    };

    let paths = AppPaths::discover()?;
    let mut state = bootstrap_filesystem(&paths)?;
    for session in &sessions {
        // Relative sources are recorded under the root so `resume` works from anywhere.
        if let Some(previous) = state.registry.register(session.record().anchored_at(&root)) {
            tracing::debug!(source = %previous.source, "replacing recorded session");
        }
    }
    state.persist(&paths.state_file())?;

    let host = HostSettings::resolve(&args.host, config.as_ref(), &paths, root);
    drive(host, sessions)
}

pub fn resume(args: HostArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let state = bootstrap_filesystem(&paths)?;
    let sessions = build_sessions(state.registry.resume_params())?;
    if sessions.is_empty() {
        println!("No recorded sessions to resume.");
        return Ok(());
    }

    let root = match &args.root {
        Some(root) => root.clone(),
        None => env::current_dir().context("failed to read current directory")?,
    };
    let host = HostSettings::resolve(&args, None, &paths, root);
    tracing::info!(sessions = sessions.len(), "resuming recorded sessions");
    drive(host, sessions)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}

fn load_session_config(path: &Path) -> Result<SessionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read session file at {}", path.display()))?;
    SessionConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load session file at {}", path.display()))
}

/// Sessions to start. `--source` wins over the session file; `--width` and
/// `--height` override every session's size.
fn session_params(args: &RunArgs, config: Option<&SessionConfig>) -> Vec<SessionParams> {
    let mut params = match (&args.source, config) {
        (None, Some(config)) => config.resolved_sessions(),
        (source, config) => {
            let defaults = config.map(|config| &config.defaults);
            let mut single = SessionParams::default();
            if let Some(source) = source {
                single.source = source.clone();
            }
            if let Some(width) = defaults.and_then(|d| d.width) {
                single.width = width;
            }
            if let Some(height) = defaults.and_then(|d| d.height) {
                single.height = height;
            }
            vec![single]
        }
    };
    for session in &mut params {
        if let Some(width) = args.width {
            session.width = width;
        }
        if let Some(height) = args.height {
            session.height = height;
        }
    }
    params
}

/// Run settings after merging CLI flags, the session file and defaults.
#[derive(Debug, Clone)]
struct HostSettings {
    renderer: RendererConfig,
    tick_interval: Duration,
    time_mode: TimeMode,
    frames: Option<u64>,
    output_dir: PathBuf,
    root: PathBuf,
}

impl HostSettings {
    fn resolve(
        args: &HostArgs,
        config: Option<&SessionConfig>,
        paths: &AppPaths,
        root: PathBuf,
    ) -> Self {
        let config_fps = config.and_then(|config| config.clock.fps);
        let time_mode = match args.time {
            Some(TimeArg::Frames) => TimeMode::Frames {
                fps: args.fps.or(config_fps).unwrap_or(DEFAULT_FPS),
            },
            Some(TimeArg::System) => TimeMode::System,
            Some(TimeArg::Still(time)) => TimeMode::Still { time },
            None => match (args.fps, config) {
                (Some(fps), _) => TimeMode::Frames { fps },
                (None, Some(config)) => config.time_mode(),
                (None, None) => TimeMode::default(),
            },
        };

        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| config.and_then(|config| config.output_dir().map(|dir| root.join(dir))))
            .unwrap_or_else(|| paths.default_output_dir());

        Self {
            renderer: RendererConfig {
                power: args.power,
                force_fallback_adapter: args.fallback_adapter,
            },
            tick_interval: args
                .tick_interval
                .or(config.map(|config| config.tick_interval))
                .unwrap_or(DEFAULT_TICK_INTERVAL),
            time_mode,
            frames: args.frames,
            output_dir,
            root,
        }
    }
}

fn build_sessions(params: Vec<SessionParams>) -> Result<Vec<Session<GpuRenderer>>> {
    params
        .into_iter()
        .map(|params| {
            let source = params.source.clone();
            Session::new(params).with_context(|| format!("invalid session for '{source}'"))
        })
        .collect()
}

fn drive(host: HostSettings, mut sessions: Vec<Session<GpuRenderer>>) -> Result<()> {
    let mut renderer =
        GpuRenderer::new(&host.renderer).context("failed to initialise GPU renderer")?;
    let adapter = renderer.adapter_profile();
    if adapter.is_software() {
        tracing::warn!(adapter = %adapter.name, "rendering on a software adapter");
    }
    tracing::debug!(
        adapter = %adapter.name,
        backend = ?adapter.backend,
        max_texture = adapter.max_texture_dimension,
        "resolved GPU adapter"
    );

    let mut documents = FsDocumentStore::new(&host.root);
    let mut images = PngImageStore::new(&host.output_dir);
    let mut clock = IntervalClock::new(host.tick_interval, time_source(host.time_mode))
        .with_frame_limit(host.frames);

    tracing::info!(
        sessions = sessions.len(),
        interval = %humantime::format_duration(host.tick_interval),
        time = %host.time_mode,
        root = %host.root.display(),
        output = %host.output_dir.display(),
        "starting glsltexd"
    );

    let summary = glsltex::run(
        &mut clock,
        &mut documents,
        &mut renderer,
        &mut images,
        &mut sessions,
    );

    tracing::info!(
        ticks = summary.ticks,
        recompiles = summary.recompiles,
        renders = summary.renders,
        publishes = summary.publishes,
        "glsltexd finished"
    );
    Ok(())
}
