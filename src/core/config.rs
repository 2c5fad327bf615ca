use anyhow::Context;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Geolocation provider configuration
pub mod ipstack {
    use super::*;

    /// Base URL of the ipstack-compatible lookup endpoint. The IP address is
    /// appended directly, so the value must end with a path separator.
    pub static URL: Lazy<String> =
        Lazy::new(|| env::var("IPSTACK_URL").unwrap_or_else(|_| "http://api.ipstack.com/".to_string()));

    /// API access key, sent as the `access_key` query parameter.
    pub static ACCESS_KEY: Lazy<String> =
        Lazy::new(|| env::var("IPSTACK_ACCESS_KEY").unwrap_or_else(|_| String::new()));
}

/// REST API configuration
pub mod api {
    use super::*;

    /// Port for the HTTP history API
    /// Read from API_PORT environment variable, default 8080
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("API_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080)
    });
}

/// Initial admin configuration
pub mod admin {
    use super::*;

    /// Telegram ID of the participant seeded as the first admin.
    ///
    /// Required; an unset or unparseable value aborts startup so the bot is
    /// never left running without any admin.
    pub fn initial_admin_id() -> anyhow::Result<i64> {
        let raw = env::var("ADMIN_TG_ID").context("ADMIN_TG_ID environment variable not set")?;
        raw.parse::<i64>()
            .with_context(|| format!("ADMIN_TG_ID is not a valid Telegram ID: {:?}", raw))
    }
}

/// Outbound delivery retry configuration
pub mod retry {
    use super::Duration;

    /// Delay between send attempts (in seconds). Sends are retried until
    /// they succeed, so this is the whole backoff policy.
    pub const SEND_RETRY_DELAY_SECS: u64 = 2;

    /// Send retry delay duration
    pub fn send_delay() -> Duration {
        Duration::from_secs(SEND_RETRY_DELAY_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for outbound HTTP requests (geolocation lookups, in seconds)
    pub const HTTP_TIMEOUT_SECS: u64 = 30;

    /// Long-poll timeout for the Telegram update listener (in seconds)
    pub const POLL_TIMEOUT_SECS: u64 = 60;

    /// HTTP client timeout duration
    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }

    /// Long-poll timeout duration
    pub fn poll_timeout() -> Duration {
        Duration::from_secs(POLL_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_delay_matches_constant() {
        assert_eq!(retry::send_delay(), Duration::from_secs(retry::SEND_RETRY_DELAY_SECS));
    }

    #[test]
    fn poll_timeout_is_sixty_seconds() {
        assert_eq!(network::poll_timeout(), Duration::from_secs(60));
    }
}
