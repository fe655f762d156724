use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod reel;
mod ui;

use crate::reel::{ReelCommands, ReelConfig, ReelError, handle_reel_command};
use crate::ui::prelude::{Level, OutputFormat, emit};

#[derive(Parser, Debug)]
#[command(name = "captionreel")]
#[command(about = "Turn spoken recordings into subtitle files and captioned videos", long_about = None)]
#[command(version)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for events
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file; defaults to <config dir>/captionreel/config.toml
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: ReelCommands,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ReelConfig::load_from_path(path)?,
        None => ReelConfig::load()?,
    };
    handle_reel_command(cli.command, &config, cli.debug)
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(err) = run(cli) {
        let code = err
            .downcast_ref::<ReelError>()
            .map(ReelError::code)
            .unwrap_or("reel.error");
        emit(Level::Error, code, &format!("{err:#}"), None);
        std::process::exit(1);
    }
}
