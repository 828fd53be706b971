use std::env;
use std::fs::{read_to_string, write};
use std::path::Path;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};

/// Name of the configuration file.
pub(crate) const CONFIG_NAME: &str = "config.json";

/// Environment variable holding the login email.
pub(crate) const EMAIL_VAR: &str = "EMAIL";

/// Environment variable holding the login password.
pub(crate) const PASSWORD_VAR: &str = "PASSWORD";

/// Config that is used to do general setup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct Config {
    /// The location of the download directory.
    #[serde(rename = "downloadDirectory", default = "default_download_directory")]
    download_directory: String,
    /// Timeout applied to every request, in seconds (default: 30).
    #[serde(rename = "requestTimeoutSecs", default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    /// Defensive cap on listing pages fetched per gallery (default: 100).
    #[serde(rename = "maxPagesPerGallery", default = "default_max_pages_per_gallery")]
    max_pages_per_gallery: usize,
}

fn default_download_directory() -> String {
    String::from("images/")
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_pages_per_gallery() -> usize {
    100
}

impl Config {
    /// The location of the download directory.
    pub(crate) fn download_directory(&self) -> &str {
        &self.download_directory
    }

    /// Timeout applied to every request, in seconds.
    pub(crate) fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }

    /// Defensive cap on listing pages fetched per gallery.
    pub(crate) fn max_pages_per_gallery(&self) -> usize {
        self.max_pages_per_gallery
    }

    /// Checks config and ensure it isn't missing.
    pub(crate) fn config_exists() -> bool {
        if !Path::new(CONFIG_NAME).exists() {
            trace!("config.json: does not exist!");
            return false;
        }

        true
    }

    /// Creates config file.
    pub(crate) fn create_config() -> Result<(), Error> {
        let json = to_string_pretty(&Config::default())?;
        write(Path::new(CONFIG_NAME), json)?;

        Ok(())
    }

    /// Loads the config file.
    pub(crate) fn load() -> Result<Self, Error> {
        Self::load_from(Path::new(CONFIG_NAME))
    }

    fn load_from(path: &Path) -> Result<Self, Error> {
        let contents = read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            download_directory: default_download_directory(),
            request_timeout_secs: default_request_timeout_secs(),
            max_pages_per_gallery: default_max_pages_per_gallery(),
        }
    }
}

/// `Login` contains the credentials the portal session is created from.
#[derive(Clone)]
pub(crate) struct Login {
    /// Email of the user.
    email: String,
    /// Password of the user.
    password: String,
}

impl Login {
    /// Email of the user.
    pub(crate) fn email(&self) -> &str {
        &self.email
    }

    /// Password of the user.
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Reads the credentials from the environment. Missing variables load as
    /// empty strings; the server's rejection surfaces downstream.
    pub(crate) fn from_env() -> Self {
        Login {
            email: env::var(EMAIL_VAR).unwrap_or_default(),
            password: env::var(PASSWORD_VAR).unwrap_or_default(),
        }
    }

    /// Checks if the login email or password is empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.email.is_empty() || self.password.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_parts(email: &str, password: &str) -> Self {
        Login {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config: Config = from_str("{}").unwrap();

        assert_eq!(config.download_directory(), "images/");
        assert_eq!(config.request_timeout_secs(), 30);
        assert_eq!(config.max_pages_per_gallery(), 100);
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config: Config = from_str(
            r#"{
                "downloadDirectory": "archive/",
                "requestTimeoutSecs": 5,
                "maxPagesPerGallery": 3
            }"#,
        )
        .unwrap();

        assert_eq!(config.download_directory(), "archive/");
        assert_eq!(config.request_timeout_secs(), 5);
        assert_eq!(config.max_pages_per_gallery(), 3);
    }

    #[test]
    fn test_config_round_trips_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_NAME);

        let json = to_string_pretty(&Config::default()).unwrap();
        write(&path, json).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.download_directory(), "images/");
    }

    #[test]
    fn test_config_load_fails_on_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.json");

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_login_from_env() {
        unsafe {
            env::set_var(EMAIL_VAR, "user@example.com");
            env::set_var(PASSWORD_VAR, "hunter2");
        }

        let login = Login::from_env();
        assert_eq!(login.email(), "user@example.com");
        assert_eq!(login.password(), "hunter2");
        assert!(!login.is_empty());

        unsafe {
            env::remove_var(EMAIL_VAR);
            env::remove_var(PASSWORD_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_login_missing_env_is_empty() {
        unsafe {
            env::remove_var(EMAIL_VAR);
            env::remove_var(PASSWORD_VAR);
        }

        let login = Login::from_env();
        assert!(login.is_empty());
    }
}
