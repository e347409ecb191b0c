//! core::config::schema
//!
//! On-disk configuration schema.
//!
//! Every field is optional in the file; missing values may be supplied by
//! environment variables and are checked when the file is resolved into an
//! [`AppConfig`](super::AppConfig).
//!
//! # Example
//!
//! ```toml
//! service_name = "release-bot"
//! app_id = 123456
//! installation_id = 7890123
//! owner = "my-org"
//! private_key_path = "/etc/hubcommit/app.pem"
//! # api_base = "https://github.example.com/api/v3"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable names that override file values.
pub const ENV_APP_ID: &str = "HUBCOMMIT_APP_ID";
pub const ENV_INSTALLATION_ID: &str = "HUBCOMMIT_INSTALLATION_ID";
pub const ENV_PRIVATE_KEY: &str = "HUBCOMMIT_PRIVATE_KEY";
pub const ENV_PRIVATE_KEY_PATH: &str = "HUBCOMMIT_PRIVATE_KEY_PATH";
pub const ENV_OWNER: &str = "HUBCOMMIT_OWNER";
pub const ENV_SERVICE_NAME: &str = "HUBCOMMIT_SERVICE_NAME";
pub const ENV_API_BASE: &str = "HUBCOMMIT_API_BASE";

/// Raw configuration as read from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Client identification sent as the User-Agent
    pub service_name: Option<String>,

    /// GitHub App id
    pub app_id: Option<u64>,

    /// Installation id of the app on the owning account
    pub installation_id: Option<u64>,

    /// Account that owns the repositories
    pub owner: Option<String>,

    /// Inline PEM private key
    pub private_key: Option<String>,

    /// Path to a PEM private key (used when `private_key` is unset)
    pub private_key_path: Option<PathBuf>,

    /// REST API base URL
    pub api_base: Option<String>,
}

impl ConfigFile {
    /// Overlay values from an environment lookup.
    ///
    /// Values that fail to parse are returned as `(variable, value)` pairs so
    /// the caller can report them.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<(&'static str, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rejected = Vec::new();

        let mut number = |name: &'static str, slot: &mut Option<u64>| {
            if let Some(raw) = lookup(name) {
                match raw.trim().parse() {
                    Ok(n) => *slot = Some(n),
                    Err(_) => rejected.push((name, raw)),
                }
            }
        };
        number(ENV_APP_ID, &mut self.app_id);
        number(ENV_INSTALLATION_ID, &mut self.installation_id);

        if let Some(v) = lookup(ENV_PRIVATE_KEY) {
            self.private_key = Some(v);
        }
        if let Some(v) = lookup(ENV_PRIVATE_KEY_PATH) {
            self.private_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_OWNER) {
            self.owner = Some(v);
        }
        if let Some(v) = lookup(ENV_SERVICE_NAME) {
            self.service_name = Some(v);
        }
        if let Some(v) = lookup(ENV_API_BASE) {
            self.api_base = Some(v);
        }

        rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_full_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            service_name = "bot"
            app_id = 1
            installation_id = 2
            owner = "org"
            private_key_path = "/tmp/key.pem"
            api_base = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(file.service_name.as_deref(), Some("bot"));
        assert_eq!(file.app_id, Some(1));
        assert_eq!(file.installation_id, Some(2));
        assert_eq!(file.private_key_path, Some(PathBuf::from("/tmp/key.pem")));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: Result<ConfigFile, _> = toml::from_str("unknown = true");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [(ENV_APP_ID, "42"), (ENV_OWNER, "other-org")].into();
        let mut file = ConfigFile {
            app_id: Some(1),
            owner: Some("org".into()),
            installation_id: Some(9),
            ..Default::default()
        };

        let rejected = file.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert!(rejected.is_empty());
        assert_eq!(file.app_id, Some(42));
        assert_eq!(file.owner.as_deref(), Some("other-org"));
        assert_eq!(file.installation_id, Some(9));
    }

    #[test]
    fn env_reports_unparseable_numbers() {
        let mut file = ConfigFile::default();
        let rejected = file.apply_env(|k| (k == ENV_INSTALLATION_ID).then(|| "abc".to_string()));

        assert_eq!(rejected, vec![(ENV_INSTALLATION_ID, "abc".to_string())]);
        assert_eq!(file.installation_id, None);
    }
}
