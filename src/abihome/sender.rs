use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header;
use serde::{Deserialize, Deserializer, Serialize};

use crate::abihome::error::{Error, Result};
use crate::abihome::io::{Config, Login};

/// Base url of the portal.
const SERVER_URL: &str = "https://www.app.abihome.de";

/// Name of the cookie the session token is carried in.
const COOKIE_NAME: &str = "Abihome";

/// Body of the session-creation call.
#[derive(Serialize)]
struct SessionRequest<'a> {
    mail: &'a str,
    passwort: &'a str,
}

/// Envelope of the session-creation response.
#[derive(Deserialize)]
struct SessionResponse {
    success: bool,
    payload: Option<SessionPayload>,
}

#[derive(Deserialize)]
struct SessionPayload {
    session: SessionEntry,
}

/// The four server-issued fields the session token is composed of.
#[derive(Deserialize)]
struct SessionEntry {
    #[serde(deserialize_with = "string_or_number")]
    uid: String,
    sectoken: String,
    key: String,
    key2: String,
}

/// Envelope of the image-listing responses.
#[derive(Deserialize)]
struct AjaxResponse {
    payload: AjaxPayload,
}

#[derive(Deserialize)]
struct AjaxPayload {
    /// An HTML fragment with image tiles, or an empty string once the gallery
    /// has no further pages.
    message: String,
}

/// The server issues `uid` as either a number or a string; the token renders
/// both the same way.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(number) => number.to_string(),
        Raw::Text(text) => text,
    })
}

/// Opaque composite authentication credential reused as a cookie value for
/// all authenticated calls. Immutable once obtained; the portal is the only
/// place it can expire.
#[derive(Clone)]
pub(crate) struct SessionToken(String);

impl SessionToken {
    fn from_session(session: &SessionEntry) -> Self {
        SessionToken(format!(
            "{}|{}|{}|{}",
            session.uid, session.sectoken, session.key, session.key2
        ))
    }

    /// The value of the `Cookie` header carrying the token.
    pub(crate) fn cookie(&self) -> String {
        format!("{COOKIE_NAME}={}", self.0)
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    /// The token is a credential; keep it out of debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// The sender used for all portal calls. Cheap to clone; every component of
/// the pipeline holds its own copy.
#[derive(Clone)]
pub(crate) struct RequestSender {
    /// The client all requests go through.
    client: Client,
    base_url: String,
}

impl RequestSender {
    /// Creates instance of `Self` with the configured request timeout.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(config, SERVER_URL.to_string())
    }

    fn with_base_url(config: &Config, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs()))
            .build()?;

        Ok(RequestSender { client, base_url })
    }

    /// Exchanges the credentials for a [SessionToken].
    ///
    /// # Arguments
    ///
    /// * `login`: The credentials to create the session from.
    pub(crate) fn authenticate(&self, login: &Login) -> Result<SessionToken> {
        let response = self
            .client
            .post(format!("{}/API/session", self.base_url))
            .json(&SessionRequest {
                mail: login.email(),
                passwort: login.password(),
            })
            .send()?;
        if response.status() != StatusCode::OK {
            return Err(Error::Transport {
                context: "retrieving the authentication token",
                status: response.status(),
            });
        }

        let session_response: SessionResponse = response.json()?;
        if !session_response.success {
            return Err(Error::InvalidCredentials);
        }

        let payload = session_response.payload.ok_or(Error::MissingSession)?;
        Ok(SessionToken::from_session(&payload.session))
    }

    /// Requests the gallery listing page and returns its markup.
    pub(crate) fn gallery_page(&self, token: &SessionToken) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/fotos", self.base_url))
            .header(header::COOKIE, token.cookie())
            .send()?;
        if response.status() != StatusCode::OK {
            return Err(Error::Transport {
                context: "retrieving the galleries",
                status: response.status(),
            });
        }

        Ok(response.text()?)
    }

    /// Requests one page of a gallery's image listing and returns the
    /// `message` fragment of the envelope.
    ///
    /// # Arguments
    ///
    /// * `gallery_id`: The gallery to list.
    /// * `page`: Zero-based pagination cursor.
    pub(crate) fn image_batch(
        &self,
        token: &SessionToken,
        gallery_id: &str,
        page: usize,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!(
                "{}/ajax.php?aktion=load_fotos&id={}&page={}",
                self.base_url, gallery_id, page
            ))
            .header(header::COOKIE, token.cookie())
            .send()?;
        if response.status() != StatusCode::OK {
            return Err(Error::Transport {
                context: "retrieving the images",
                status: response.status(),
            });
        }

        let ajax_response: AjaxResponse = response.json()?;
        Ok(ajax_response.payload.message)
    }

    /// Downloads the raw content of a single image.
    pub(crate) fn image_bytes(&self, token: &SessionToken, image_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/file_load.php?id={}", self.base_url, image_id))
            .header(header::COOKIE, token.cookie())
            .send()?;
        if response.status() != StatusCode::OK {
            return Err(Error::Transport {
                context: "downloading the images",
                status: response.status(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}
