mod command;
mod config;
mod daemon;
mod ephemeris;
mod events;
mod motor;
mod net;
mod pointing;
mod radio;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "srtd")]
#[command(about = "Small radio telescope control daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration directory
    Validate {
        #[arg(long, default_value = "./config")]
        config: PathBuf,
    },
    /// Run the control daemon
    Run {
        #[arg(long, default_value = "./config")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run { config } => run(&config),
    }
}

fn validate(dir: &Path) -> ExitCode {
    match Config::from_dir(dir) {
        Ok(config) => {
            println!(
                "Configuration is valid ({} catalog objects, station '{}')",
                config.objects.len(),
                config.station.name
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Config error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(dir: &Path) -> ExitCode {
    let config = match Config::from_dir(dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(daemon::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Daemon error: {}", e);
            ExitCode::FAILURE
        }
    }
}
