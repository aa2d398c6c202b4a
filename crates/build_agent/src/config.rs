//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use preview_sandbox::DEFAULT_STARTUP_TIMEOUT;

use crate::providers::DEFAULT_PROVIDER_ID;

pub const PROVIDER_ENV_VAR: &str = "BUILDER_PROVIDER";
pub const BACKEND_URL_ENV_VAR: &str = "BUILDER_BACKEND_URL";
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "BUILDER_REQUEST_TIMEOUT_SECS";
pub const OUTPUT_DIR_ENV_VAR: &str = "BUILDER_OUTPUT_DIR";
pub const PREVIEW_ENV_VAR: &str = "BUILDER_PREVIEW";
pub const PREVIEW_TIMEOUT_ENV_VAR: &str = "BUILDER_PREVIEW_TIMEOUT_SECS";

pub const DEFAULT_OUTPUT_DIR: &str = "generated-site";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub provider: String,
    pub backend_url: Option<String>,
    pub request_timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub preview: bool,
    pub preview_timeout: Duration,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            provider: env_string_opt(PROVIDER_ENV_VAR)
                .map(|value| value.trim().to_string())
                .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string()),
            backend_url: env_string_opt(BACKEND_URL_ENV_VAR),
            request_timeout: env_secs_opt(REQUEST_TIMEOUT_ENV_VAR),
            output_dir: env_string_opt(OUTPUT_DIR_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            preview: env_flag(PREVIEW_ENV_VAR),
            preview_timeout: env_secs_opt(PREVIEW_TIMEOUT_ENV_VAR)
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// Positive whole seconds. Anything else is ignored with a warning.
fn env_secs_opt(key: &str) -> Option<Duration> {
    let raw = env_string_opt(key)?;
    match raw.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Some(Duration::from_secs(seconds)),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid duration; expected seconds > 0");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _lock = env_lock();
        let _g1 = set_env_guard(PROVIDER_ENV_VAR, None);
        let _g2 = set_env_guard(BACKEND_URL_ENV_VAR, None);
        let _g3 = set_env_guard(REQUEST_TIMEOUT_ENV_VAR, None);
        let _g4 = set_env_guard(OUTPUT_DIR_ENV_VAR, None);
        let _g5 = set_env_guard(PREVIEW_ENV_VAR, None);
        let _g6 = set_env_guard(PREVIEW_TIMEOUT_ENV_VAR, None);

        let config = EnvConfig::from_env();
        assert_eq!(config.provider, "mock");
        assert!(config.backend_url.is_none());
        assert!(config.request_timeout.is_none());
        assert_eq!(config.output_dir, PathBuf::from("generated-site"));
        assert!(!config.preview);
        assert_eq!(config.preview_timeout, Duration::from_secs(30));
    }

    #[test]
    fn explicit_values_are_read() {
        let _lock = env_lock();
        let _g1 = set_env_guard(PROVIDER_ENV_VAR, Some(" http "));
        let _g2 = set_env_guard(BACKEND_URL_ENV_VAR, Some("http://127.0.0.1:8080"));
        let _g3 = set_env_guard(REQUEST_TIMEOUT_ENV_VAR, Some("45"));
        let _g4 = set_env_guard(OUTPUT_DIR_ENV_VAR, Some("/tmp/site"));
        let _g5 = set_env_guard(PREVIEW_ENV_VAR, Some("1"));
        let _g6 = set_env_guard(PREVIEW_TIMEOUT_ENV_VAR, Some("90"));

        let config = EnvConfig::from_env();
        assert_eq!(config.provider, "http");
        assert_eq!(config.backend_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/site"));
        assert!(config.preview);
        assert_eq!(config.preview_timeout, Duration::from_secs(90));
    }

    #[test]
    fn zero_and_garbage_durations_are_ignored() {
        let _lock = env_lock();
        let _g1 = set_env_guard(REQUEST_TIMEOUT_ENV_VAR, Some("0"));
        let _g2 = set_env_guard(PREVIEW_TIMEOUT_ENV_VAR, Some("soon"));

        let config = EnvConfig::from_env();
        assert!(config.request_timeout.is_none());
        assert_eq!(config.preview_timeout, DEFAULT_STARTUP_TIMEOUT);
    }

    #[test]
    fn preview_flag_requires_exactly_one() {
        let _lock = env_lock();
        let _g1 = set_env_guard(PREVIEW_ENV_VAR, Some("true"));
        assert!(!EnvConfig::from_env().preview);
    }
}
