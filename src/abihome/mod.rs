use std::fs::{create_dir_all, write};
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::abihome::error::{Error, Result};
use crate::abihome::grabber::Gallery;
use crate::abihome::io::Config;
use crate::abihome::sender::{RequestSender, SessionToken};

pub(crate) mod error;
pub(crate) mod grabber;
pub(crate) mod io;
pub(crate) mod sender;

/// A web connector that downloads every grabbed image into a directory tree
/// mirroring gallery titles.
pub(crate) struct AbihomeWebConnector {
    /// The sender used for all portal calls.
    request_sender: RequestSender,
    /// Token accompanying every call.
    token: SessionToken,
    /// Progress bar that displays the current progress in downloading images.
    progress_bar: ProgressBar,
    /// Root the per-gallery directories are created under.
    download_directory: PathBuf,
}

impl AbihomeWebConnector {
    /// Creates instance of `Self` for downloading grabbed images.
    pub(crate) fn new(request_sender: RequestSender, token: SessionToken, config: &Config) -> Self {
        AbihomeWebConnector {
            request_sender,
            token,
            progress_bar: ProgressBar::hidden(),
            download_directory: PathBuf::from(config.download_directory()),
        }
    }

    /// Initializes the progress bar with a fresh instance for downloads.
    ///
    /// # Arguments
    ///
    /// * `len`: Length of the progress bar.
    fn initialize_progress_bar(&mut self, len: u64) {
        const PROGRESS_TEMPLATE: &str = "{spinner} {bar:40} {pos}/{len} {msg}";

        let progress_style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");

        self.progress_bar = ProgressBar::new(len);
        self.progress_bar.set_style(progress_style);
        self.progress_bar
            .set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        self.progress_bar
            .enable_steady_tick(Duration::from_millis(200));
    }

    /// Downloads every image of every gallery, one gallery directory at a
    /// time. Existing files are overwritten, so a re-run converges on the
    /// same tree.
    pub(crate) fn download_galleries(&mut self, galleries: &[Gallery]) -> Result<()> {
        let total = galleries
            .iter()
            .map(|gallery| gallery.images().len() as u64)
            .sum();
        self.initialize_progress_bar(total);

        for gallery in galleries {
            let gallery_path = self.download_directory.join(gallery.title());
            create_dir_all(&gallery_path).map_err(|source| Error::DirectoryCreation {
                path: gallery_path.clone(),
                source,
            })?;

            info!("Downloading images from gallery '{}'", gallery.title());
            self.progress_bar.set_message(gallery.title().to_string());
            for image_id in gallery.images() {
                let bytes = self.request_sender.image_bytes(&self.token, image_id)?;
                write(gallery_path.join(format!("{image_id}.jpeg")), &bytes)?;
                self.progress_bar.inc(1);
            }
        }

        self.progress_bar.finish_and_clear();
        Ok(())
    }
}
