use std::env::current_dir;

use anyhow::Error;
use console::Term;
use log::{info, trace, warn};

use crate::abihome::AbihomeWebConnector;
use crate::abihome::grabber::Grabber;
use crate::abihome::io::{Config, Login};
use crate::abihome::sender::RequestSender;

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A program class that handles the flow of the downloader steps of execution.
pub(crate) struct Program;

impl Program {
    /// Creates a new instance of the program.
    pub(crate) fn new() -> Self {
        Self
    }

    /// Runs the downloader program.
    pub(crate) fn run(&self) -> Result<(), Error> {
        Term::stdout().set_title("abihome downloader");
        trace!("Starting abihome downloader...");
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        if let Ok(working_dir) = current_dir() {
            trace!("Program Working Directory: {}", working_dir.display());
        }

        // Check the config file and ensure that it is created.
        trace!("Checking if config file exists...");
        if !Config::config_exists() {
            info!("Creating config file...");
            Config::create_config()?;
        }
        let config = Config::load()?;

        let login = Login::from_env();
        trace!("Login information loaded...");
        trace!("Login Email: {}", login.email());
        trace!("Login Password: {}", "*".repeat(login.password().len()));
        if login.is_empty() {
            warn!("EMAIL or PASSWORD is not set; the portal will reject the login.");
        }

        let request_sender = RequestSender::new(&config)?;

        info!("Retrieving login token...");
        let token = request_sender.authenticate(&login)?;
        trace!("Session Token: {}", "*".repeat(token.as_str().len()));
        info!("Successfully retrieved login token!");

        info!("Collecting all galleries...");
        let grabber = Grabber::new(request_sender.clone(), token.clone(), &config);
        let mut galleries = grabber.grab_galleries()?;

        info!("Collecting all images from the galleries...");
        grabber.grab_images(&mut galleries)?;

        info!("Downloading images...");
        let mut connector = AbihomeWebConnector::new(request_sender, token, &config);
        connector.download_galleries(&galleries)?;

        info!("Downloaded all images!");

        Ok(())
    }
}
