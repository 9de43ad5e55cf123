use clap::Parser;
use log::{error, info};

use coco_unite::config::{Args, Command};
use coco_unite::pipeline::{run, run_split, run_stats, run_unite};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Unite(unite_args) => run_unite(unite_args),
        Command::Split(split_args) => run_split(split_args),
        Command::Run(run_args) => run(run_args),
        Command::Stats(stats_args) => run_stats(stats_args),
    };

    match result {
        Ok(()) => info!("Done."),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
