mod bootstrap;
mod cli;
mod paths;
mod run;
mod state;

use std::fs;

use anyhow::{bail, Context, Result};
use cli::{Command, SessionsAction, TemplateArgs};
use glsltex::template::DEFAULT_FRAGMENT;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Resume(args)) => run::resume(args),
        Some(Command::Template(args)) => write_template(args),
        Some(Command::Sessions(sessions_cmd)) => handle_sessions_command(sessions_cmd.action),
        None => run::run(cli.run),
    }
}

fn write_template(args: TemplateArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            args.path.display()
        );
    }
    if let Some(parent) = args.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        bootstrap::ensure_directory(parent)?;
    }
    fs::write(&args.path, DEFAULT_FRAGMENT)
        .with_context(|| format!("failed to write template to {}", args.path.display()))?;
    println!("Wrote default fragment shader to {}", args.path.display());
    Ok(())
}

fn handle_sessions_command(action: SessionsAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    let mut state = bootstrap::bootstrap_filesystem(&paths)?;

    match action {
        SessionsAction::List => {
            if state.registry.is_empty() {
                println!("No recorded sessions.");
                return Ok(());
            }
            println!("Recorded sessions:");
            for (key, record) in state.registry.records() {
                println!(
                    "  {key:<20} {:>5}x{:<5} source={}",
                    record.width, record.height, record.source
                );
            }
        }
        SessionsAction::Forget { key } => {
            let Some(record) = state.registry.forget(&key) else {
                bail!("no recorded session publishes image '{key}'");
            };
            state.persist(&paths.state_file())?;
            println!("Forgot session '{key}' (source={})", record.source);
        }
        SessionsAction::Clear => {
            let count = state.registry.len();
            state.registry.clear();
            state.persist(&paths.state_file())?;
            println!("Cleared {count} recorded session(s).");
        }
    }

    Ok(())
}
