use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use log::{ LevelFilter, info };
use lib::{ config::Config, free_particle, logging };

// propagate a Gaussian wavepacket under a uniform inter-state coupling and
// save the trajectory

#[derive(Debug, Parser)]
#[command(about = "Split-operator propagation of a free multi-state wavepacket")]
struct Cli {
    /// TOML run configuration.
    config: PathBuf,

    /// Log debug messages from the propagator.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::logger_init(
        if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info })?;
    let cfg = Config::from_file(&cli.config)?;
    info!("loaded {}", cli.config.display());

    let run = free_particle::run(&cfg, 1e-8)?;
    free_particle::save(&cfg.output, &cfg, &run)?;
    Ok(())
}
