use crate::error::ConfigError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_USER_ID: &str = "netrunnerX";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1_000;
const DEFAULT_RECONNECT_MAX_SECS: u64 = 5;

const ENV_API_URL: &str = "RELIEF_API_URL";
const ENV_SOCKET_URL: &str = "RELIEF_SOCKET_URL";
const ENV_USER_ID: &str = "RELIEF_USER_ID";
const ENV_REQUEST_TIMEOUT_SECS: &str = "RELIEF_REQUEST_TIMEOUT_SECS";
const ENV_RECONNECT_MAX_SECS: &str = "RELIEF_RECONNECT_MAX_SECS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            max: Duration::from_secs(DEFAULT_RECONNECT_MAX_SECS),
            factor: 2,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given retry (0-based), capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.factor.max(1).saturating_pow(attempt.min(16));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[derive(Clone, Debug)]
pub struct ReliefConfig {
    pub api_url: Url,
    pub socket_url: Url,
    pub user_id: String,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ReliefConfig {
    pub fn new(api_url: &str, user_id: &str) -> Result<Self, ConfigError> {
        let api_url = parse_url(ENV_API_URL, api_url)?;
        let socket_url = socket_url_for(&api_url)?;
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ConfigError::Invalid {
                var: ENV_USER_ID,
                reason: "identity must not be empty".into(),
            });
        }
        Ok(Self {
            api_url,
            socket_url,
            user_id: user_id.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            reconnect: ReconnectPolicy::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env_value(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let user_id = env_value(ENV_USER_ID).unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let mut config = Self::new(&api_url, &user_id)?;

        if let Some(raw) = env_value(ENV_SOCKET_URL) {
            config.socket_url = parse_url(ENV_SOCKET_URL, &raw)?;
        }
        if let Some(secs) = positive_secs(ENV_REQUEST_TIMEOUT_SECS)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive_secs(ENV_RECONNECT_MAX_SECS)? {
            config.reconnect.max = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Appends `segments` to the API base. Each segment is percent-encoded,
    /// so `/`, `?` and `#` inside one stay inside it.
    pub fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.api_url.clone();
        // http(s) and ws(s) URLs always have a hierarchical path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }
}

/// Maps `http(s)://host` to `ws(s)://host`.
pub fn socket_url_for(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ConfigError::Invalid {
                var: ENV_API_URL,
                reason: format!("unsupported scheme `{other}`"),
            })
        }
    };
    let mut url = api_url.clone();
    url.set_scheme(scheme).map_err(|()| ConfigError::Invalid {
        var: ENV_SOCKET_URL,
        reason: format!("cannot derive socket url from `{api_url}`"),
    })?;
    Ok(url)
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn positive_secs(var: &'static str) -> Result<Option<u64>, ConfigError> {
    env_value(var)
        .map(|raw| {
            let value = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var,
                reason: "must be a whole number of seconds".into(),
            })?;
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be greater than zero".into(),
                });
            }
            Ok(value)
        })
        .transpose()
}
