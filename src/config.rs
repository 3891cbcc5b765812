use std::time::Duration;

use serde::Deserialize;

const DEFAULT_USER_AGENT: &str = concat!(
    "dietcoach/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/dietcoach/dietcoach)"
);

#[derive(Debug, Clone, Deserialize)]
pub struct FoodDbConfig {
    pub base_url: String,
    pub user_agent: String,
    pub search_page_size: u32,
    pub search_lang: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// `None` when `GEMINI_API_KEY` is unset or blank.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub language: String,
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub food_db: FoodDbConfig,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let food_db = FoodDbConfig {
            base_url: env_or("OFF_BASE_URL", "https://world.openfoodfacts.org"),
            user_agent: env_or("OFF_USER_AGENT", DEFAULT_USER_AGENT),
            search_page_size: parse_or("SEARCH_PAGE_SIZE", 10)?,
            search_lang: env_or("SEARCH_LANG", "it"),
        };
        let gemini = GeminiConfig {
            api_key: secret_env("GEMINI_API_KEY"),
            model: env_or("GEMINI_MODEL", "gemini-1.5-flash-latest"),
            base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            timeout_secs: parse_or("GEMINI_TIMEOUT_SECS", 15)?,
            language: env_or("ADVICE_LANGUAGE", "Italian"),
        };
        anyhow::ensure!(
            food_db.search_page_size > 0,
            "SEARCH_PAGE_SIZE must be greater than zero"
        );
        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: parse_or("APP_PORT", 5000)?,
            food_db,
            gemini,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Blank values count as unset so a stray `GEMINI_API_KEY=` reads as missing.
fn secret_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
impl AppConfig {
    /// Config pointing both upstreams at `base_url`, with or without a Gemini key.
    pub fn for_tests(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            food_db: FoodDbConfig {
                base_url: base_url.into(),
                user_agent: DEFAULT_USER_AGENT.into(),
                search_page_size: 10,
                search_lang: "it".into(),
            },
            gemini: GeminiConfig {
                api_key: api_key.map(str::to_string),
                model: "gemini-test".into(),
                base_url: base_url.into(),
                timeout_secs: 5,
                language: "Italian".into(),
            },
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let v: u32 = parse_or("DIETCOACH_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        std::env::set_var("DIETCOACH_TEST_BAD_PORT", "not-a-port");
        let res: anyhow::Result<u16> = parse_or("DIETCOACH_TEST_BAD_PORT", 1);
        assert!(res.is_err());
        std::env::remove_var("DIETCOACH_TEST_BAD_PORT");
    }

    #[test]
    fn env_or_ignores_blank_values() {
        std::env::set_var("DIETCOACH_TEST_BLANK", "   ");
        assert_eq!(env_or("DIETCOACH_TEST_BLANK", "fallback"), "fallback");
        std::env::remove_var("DIETCOACH_TEST_BLANK");
    }

    #[test]
    fn blank_gemini_key_is_treated_as_missing() {
        std::env::set_var("GEMINI_API_KEY", " \t ");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.gemini.api_key, None);

        std::env::set_var("GEMINI_API_KEY", "  real-key ");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.gemini.api_key.as_deref(), Some("real-key"));

        std::env::remove_var("GEMINI_API_KEY");
        assert_eq!(secret_env("GEMINI_API_KEY"), None);
    }
}
