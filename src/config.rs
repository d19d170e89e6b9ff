//! Process-wide configuration.
//!
//! Loaded once at startup from an optional TOML file with `CASEFLOW__*`
//! environment overrides (double underscore for nested keys, e.g.
//! `CASEFLOW__AUTH__ADMIN_PASSWORD`). Credentials live here and nowhere
//! else; the engine never persists or logs them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub auth: AuthSettings,
    pub browser: BrowserSettings,
    pub retry: RetrySettings,
    pub timeouts: TimeoutSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub base_url: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Standard and administrator credential pairs; which one an operation uses
/// is decided per call.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub username: String,
    pub password: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub binary: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            binary: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay_ms: 0,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms)),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub navigation_ms: u64,
    pub wait_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            navigation_ms: 10_000,
            wait_ms: 2_000,
        }
    }
}

impl TimeoutSettings {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Load settings from an optional file, then `CASEFLOW__*` env overrides.
pub fn load_settings(config_path: Option<PathBuf>) -> Result<Settings, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CASEFLOW")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn defaults_apply_without_a_file() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.registry.base_url, "http://localhost:8080");
        assert!(settings.browser.headless);
        assert_eq!(settings.retry.max_retries, 1);
        assert_eq!(settings.retry.policy(), RetryPolicy::default());
        assert_eq!(settings.timeouts.navigation(), Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[registry]
base_url = "https://registry.example"

[auth]
username = "caseflow-user"
password = "pw"
admin_username = "caseflow-admin"
admin_password = "admin-pw"

[retry]
max_retries = 2
delay_ms = 250
"#
        )
        .unwrap();

        let settings = load_settings(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.registry.base_url, "https://registry.example");
        assert_eq!(settings.auth.admin_username, "caseflow-admin");
        let policy = settings.retry.policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay, Some(Duration::from_millis(250)));
    }
}
