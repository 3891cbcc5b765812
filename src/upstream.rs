use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Raised while wiring an upstream client at startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Pooled client carrying the fixed user agent. Per-call timeouts are set on
/// each request; `default_timeout` bounds anything that forgets to.
pub fn build_http_client(user_agent: &str, default_timeout: Duration) -> Result<Client, InitError> {
    let client = ClientBuilder::new()
        .user_agent(user_agent)
        .timeout(default_timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    Ok(client)
}

/// First `max` characters of an upstream body, for log lines.
pub fn preview(body: &str, max: usize) -> String {
    let mut out: String = body.chars().take(max).collect();
    if body.chars().count() > max {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod upstream_tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("caffè latte", 5), "caffè...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let e = InitError::MissingCredential("GEMINI_API_KEY");
        assert_eq!(e.to_string(), "GEMINI_API_KEY environment variable not set");
    }

    #[test]
    fn builds_client_with_user_agent() {
        assert!(build_http_client("dietcoach-test/0.1", Duration::from_secs(1)).is_ok());
    }
}
