use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "glsltexd",
    author,
    version,
    about = "Compiles a GLSL fragment shader live into a texture",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Fragment shader to watch; relative paths resolve against `--root`.
    #[arg(long, value_name = "PATH")]
    pub source: Option<String>,

    /// Output texture width in pixels.
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: Option<u32>,

    /// Output texture height in pixels.
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: Option<u32>,

    /// Session file describing one or more shaders to run together.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub host: HostArgs,
}

/// Options shared by every command that drives sessions.
#[derive(Parser, Debug)]
pub struct HostArgs {
    /// Frame rate used to derive shader time in `frames` mode.
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Wall-clock time between ticks (e.g. `100ms`, `0.5`).
    #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
    pub tick_interval: Option<Duration>,

    /// Shader time source: `frames`, `system`, or `still[:SECONDS]`.
    #[arg(long, value_name = "MODE", value_parser = parse_time_arg)]
    pub time: Option<TimeArg>,

    /// Stop after this many ticks instead of running until interrupted.
    #[arg(long, value_name = "COUNT")]
    pub frames: Option<u64>,

    /// Directory receiving `<image>.png` after every published frame.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory relative shader paths resolve against.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// GPU power preference: `low` or `high`.
    #[arg(
        long,
        value_name = "PREFERENCE",
        value_parser = parse_power_preference,
        default_value = "low"
    )]
    pub power: GpuPowerPreference,

    /// Only accept a software (fallback) adapter.
    #[arg(long)]
    pub fallback_adapter: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restart every session recorded by previous runs.
    Resume(HostArgs),
    /// Write the default fragment shader template to a file.
    Template(TemplateArgs),
    /// Inspect or edit the recorded sessions.
    Sessions(SessionsCommand),
}

#[derive(Parser, Debug)]
pub struct TemplateArgs {
    /// Destination path for the template.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Overwrite the destination if it already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub action: SessionsAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// Print every recorded session.
    List,
    /// Remove the session publishing the given image.
    Forget {
        #[arg(value_name = "IMAGE")]
        key: String,
    },
    /// Remove all recorded sessions.
    Clear,
}

/// Time source requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeArg {
    Frames,
    System,
    Still(f32),
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_time_arg(value: &str) -> Result<TimeArg, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time mode must not be empty".to_string());
    }

    let (mode, rest) = match trimmed.split_once([':', '=']) {
        Some((mode, rest)) => (mode.trim().to_ascii_lowercase(), Some(rest.trim())),
        None => (trimmed.to_ascii_lowercase(), None),
    };

    match (mode.as_str(), rest) {
        ("frames" | "frame", None) => Ok(TimeArg::Frames),
        ("system" | "wall", None) => Ok(TimeArg::System),
        ("still", None) => Ok(TimeArg::Still(0.0)),
        ("still", Some(seconds)) => {
            let time: f32 = seconds
                .parse()
                .map_err(|_| format!("invalid still time '{seconds}'; expected seconds"))?;
            if !time.is_finite() || time < 0.0 {
                return Err("still time must be a non-negative number of seconds".into());
            }
            Ok(TimeArg::Still(time))
        }
        ("frames" | "frame" | "system" | "wall", Some(_)) => {
            Err(format!("time mode '{mode}' takes no argument"))
        }
        (other, _) => Err(format!(
            "unknown time mode '{other}'; expected frames, system, or still[:SECONDS]"
        )),
    }
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err("frame rate must be greater than zero".into());
    }
    Ok(fps)
}

/// Accepts humantime strings (`250ms`, `2s`) or plain seconds (`0.5`).
pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    let duration = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Duration::from_secs_f64(seconds),
        Ok(_) => return Err("tick interval must be a non-negative number".into()),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid tick interval '{trimmed}': {err}"))?,
    };
    if duration.is_zero() {
        return Err("tick interval must be greater than zero".into());
    }
    Ok(duration)
}

pub fn parse_power_preference(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown power preference '{other}'; expected low or high")),
    }
}
