#[macro_use]
extern crate log;

use std::fs::File;
use std::process::exit;

use anyhow::Error;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use crate::program::Program;

mod abihome;
mod program;

/// Name of the log file debug output is mirrored into.
const LOG_NAME: &str = "abihome_downloader.log";

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    initialize_logger();
    install_interrupt_handler();

    let program = Program::new();
    program.run()
}

/// Initializes the logger with preset filtering.
fn initialize_logger() {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str("abihome_downloader");

    let log_file = match File::create(LOG_NAME) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to create log file: {e}. Logging will only output to terminal.");
            let _ = TermLogger::init(
                LevelFilter::Info,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Debug, config.build(), log_file),
    ])
    .is_err()
    {
        let _ = TermLogger::init(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

/// Catches the interrupt signal so an aborted run exits with a clean message
/// instead of an error.
fn install_interrupt_handler() {
    let handler = ctrlc::set_handler(|| {
        println!("Interrupt occurred. Exiting...");
        exit(0);
    });

    if let Err(e) = handler {
        warn!("Unable to install the interrupt handler: {e}");
    }
}
