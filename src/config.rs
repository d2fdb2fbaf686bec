use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout_seconds: u64,
    pub gemini_max_retry_attempts: usize,
    pub description_language: String,
    pub target_language: String,
    pub input_error_flash_ms: u64,
    pub copy_confirm_ms: u64,
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_first_non_empty(names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        warn!(
            "GEMINI_BASE_URL is empty; using default {}",
            DEFAULT_GEMINI_BASE_URL
        );
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }
    trimmed.to_string()
}

fn non_empty_or(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

impl Config {
    pub fn load() -> Self {
        Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: non_empty_or(env_string("LOG_DIR", "logs"), "logs"),
            gemini_api_key: env_first_non_empty(&["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"]),
            gemini_model: non_empty_or(
                env_string("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                DEFAULT_GEMINI_MODEL,
            ),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
            )),
            gemini_timeout_seconds: env_u64("GEMINI_TIMEOUT_SECONDS", 90),
            gemini_max_retry_attempts: env_usize("GEMINI_MAX_RETRY_ATTEMPTS", 2).max(1),
            description_language: non_empty_or(
                env_string("COMPOSER_LANGUAGE", "Portuguese"),
                "Portuguese",
            ),
            target_language: non_empty_or(
                env_string("COMPOSER_TARGET_LANGUAGE", "English"),
                "English",
            ),
            input_error_flash_ms: env_u64("INPUT_ERROR_FLASH_MS", 500),
            copy_confirm_ms: env_u64("COPY_CONFIRM_MS", 2000),
        }
    }

    pub fn has_gemini_credentials(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }

    pub fn gemini_timeout(&self) -> Option<Duration> {
        if self.gemini_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.gemini_timeout_seconds))
        }
    }

    pub fn input_error_flash(&self) -> Duration {
        Duration::from_millis(self.input_error_flash_ms)
    }

    pub fn copy_confirm(&self) -> Duration {
        Duration::from_millis(self.copy_confirm_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped_from_base_url() {
        let normalized = normalize_base_url("https://example.test/v1beta/models//".to_string());
        assert_eq!(normalized, "https://example.test/v1beta/models");
    }

    #[test]
    fn blank_base_url_falls_back_to_default() {
        assert_eq!(normalize_base_url("   ".to_string()), DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn blank_language_keeps_default() {
        assert_eq!(non_empty_or(" ".to_string(), "English"), "English");
        assert_eq!(non_empty_or(" Spanish ".to_string(), "English"), "Spanish");
    }
}
