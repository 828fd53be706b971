use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a run. None of these are retried anywhere; the
/// first failure unwinds the whole pipeline.
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// The server answered a request with a status other than 200.
    #[error("unexpected status {status} while {context}")]
    Transport {
        /// Which step of the pipeline was running.
        context: &'static str,
        status: StatusCode,
    },

    #[error("the portal rejected the supplied credentials")]
    InvalidCredentials,

    /// An output folder could not be created (for a reason other than it
    /// already existing).
    #[error("could not create directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The login response claimed success but did not carry a session.
    #[error("session response is missing its payload")]
    MissingSession,

    /// The gallery listing page produced a different number of titles than
    /// gallery containers, so positional pairing would mis-label galleries.
    #[error("gallery listing is inconsistent: {titles} titles for {entries} gallery entries")]
    ListingMismatch { titles: usize, entries: usize },

    /// A gallery or image element carried no `id` attribute at all.
    #[error("markup element has no id attribute (expected one containing {marker:?})")]
    MissingIdAttribute { marker: &'static str },

    /// An `id` attribute did not contain the marker the id is derived from.
    #[error("id attribute {attribute:?} does not contain the marker {marker:?}")]
    IdMarkerNotFound {
        attribute: String,
        marker: &'static str,
    },

    /// A gallery kept returning pages past the configured cap.
    #[error("gallery {gallery_id} did not finish within {limit} pages")]
    PageLimitReached { gallery_id: String, limit: usize },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
