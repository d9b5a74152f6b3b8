use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::core::error::ConfigError;

const CONFIG_FILE: &str = "ldprotest";
const ENV_PREFIX: &str = "LDPROTEST";

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Args {
    pub(crate) base_url: String,
    #[serde(default = "default_user_agent")]
    pub(crate) user_agent: String,
    #[serde(default = "default_log_level")]
    pub(crate) log_level: String,
    pub(crate) storage_path: Option<String>,
    #[serde(default = "default_timeout")]
    pub(crate) request_timeout_secs: u64,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) view_north: Option<f64>,
    pub(crate) view_south: Option<f64>,
    pub(crate) view_east: Option<f64>,
    pub(crate) view_west: Option<f64>,
}

fn default_user_agent() -> String {
    format!("ldprotest-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_timeout() -> u64 {
    30
}

impl Args {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(config.try_deserialize::<Args>()?)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => dirs::data_dir()
                .map(|dir| dir.join("ldprotest"))
                .ok_or(ConfigError::NoStorageDir),
        }
    }

    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }

    /// The configured initial viewport as `(north, south, east, west)`, if all
    /// four edges are set.
    pub(crate) fn view(&self) -> Option<(f64, f64, f64, f64)> {
        Some((
            self.view_north?,
            self.view_south?,
            self.view_east?,
            self.view_west?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: &str) -> Args {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = args(r#"{"base_url":"https://map.example.org"}"#);

        assert_eq!(args.log_level, "info");
        assert!(args.user_agent.starts_with("ldprotest-client/"));
        assert_eq!(args.request_timeout(), Duration::from_secs(30));
        assert_eq!(args.credentials(), None);
        assert_eq!(args.view(), None);
    }

    #[test]
    fn test_view_needs_all_edges() {
        let partial = args(r#"{"base_url":"x","view_north":10.0,"view_south":0.0}"#);
        assert_eq!(partial.view(), None);

        let full = args(
            r#"{"base_url":"x","view_north":10.0,"view_south":0.0,"view_east":5.0,"view_west":-5.0}"#,
        );
        assert_eq!(full.view(), Some((10.0, 0.0, 5.0, -5.0)));
    }

    #[test]
    fn test_explicit_storage_path() {
        let args = args(r#"{"base_url":"x","storage_path":"/tmp/ldprotest-test"}"#);

        assert_eq!(
            args.storage_dir().unwrap(),
            PathBuf::from("/tmp/ldprotest-test")
        );
    }
}
