mod album;
mod cli;
mod config;
mod downloader;
mod file_utils;
mod gate;
mod logger;
mod pipeline;
mod preflight;
mod runner;
mod uploader;

use crate::{
    cli::{Cli, OutputConfig},
    config::Config,
    gate::{Checkpoint, TerminalPrompter},
    logger::Logger,
    pipeline::{Outcome, Pipeline},
    runner::SystemRunner,
};
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = Logger::new(OutputConfig::from_cli(&cli));

    // Credentials are checked before any external tool is started
    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            logger.error(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };
    logger.debug(&format!("{:?}", config));

    // Prompts only make sense when someone is at the keyboard
    let gate = if !cli.non_interactive && std::io::stdin().is_terminal() {
        Checkpoint::interactive(Box::new(TerminalPrompter))
    } else {
        Checkpoint::disabled()
    };

    let report = Pipeline::new(&config, &SystemRunner, &logger, gate).run();
    logger.debug(&format!("Completed phases: {:?}", report.completed));

    match &report.outcome {
        Outcome::Completed => logger.run_complete(report.summary()),
        Outcome::Aborted(phase) => logger.info(&format!("Migration stopped before: {}", phase.label())),
        Outcome::Failed(phase, e) => logger.error(&format!("{} failed: {:#}", phase.label(), e)),
    }
    ExitCode::from(report.outcome.exit_code())
}
