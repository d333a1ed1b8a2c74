use anyhow::Result;
use clap::Parser;
use percore::{cli::Cli, clock::SystemInfo, monitor};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; warnings always reach stderr
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let command = match args.command.clone() {
        Some(command) if !command.is_empty() => command,
        _ => anyhow::bail!("Must specify a command. Usage: percore [OPTIONS] -- COMMAND [ARGS...]"),
    };

    // Tick frequency and core counts are fixed for the whole run
    let system = SystemInfo::query()?;
    let config = monitor::MonitorConfig::from_cli(&args, system)?;

    let exit_code = monitor::monitor_command(&command, config)?;

    // Exit with the monitored program's exit code
    std::process::exit(exit_code);
}
