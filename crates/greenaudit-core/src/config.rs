use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_TEXT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_VISION_MODEL: &str = "claude-sonnet-4-5-20250929";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    pub api_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub text_timeout_secs: u64,
    pub vision_timeout_secs: u64,
    /// Retries after the first attempt, for rate limits and timeouts only.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub retry_delay_ms: u64,
    pub text_max_tokens: u32,
    pub vision_max_tokens: u32,
}

impl GatewaySettings {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_secs(self.text_timeout_secs)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_timeout_secs)
    }

    /// Backoff before retry number `attempt` (0-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            vision_model: DEFAULT_VISION_MODEL.into(),
            text_timeout_secs: 30,
            vision_timeout_secs: 90,
            max_retries: 1,
            retry_delay_ms: 5_000,
            text_max_tokens: 4096,
            vision_max_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    pub cache_dir: PathBuf,
    pub vision_workers: usize,
    pub render_dpi: u32,
    /// Only the first `max_pages` pages are processed when set.
    pub max_pages: Option<usize>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/cache"),
            vision_workers: 2,
            render_dpi: 150,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    pub min_keyword_len: usize,
    pub keyword_match_threshold: f64,
    pub evidence_excerpt_chars: usize,
    pub concurrency: usize,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            min_keyword_len: 5,
            keyword_match_threshold: 0.3,
            evidence_excerpt_chars: 1500,
            concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub anthropic_api_key: String,
    pub server_host: String,
    pub server_port: u16,
    pub gateway: GatewaySettings,
    pub extraction: ExtractionSettings,
    pub verification: VerificationSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let gateway_defaults = GatewaySettings::default();
        let extraction_defaults = ExtractionSettings::default();

        let gateway = GatewaySettings {
            api_url: std::env::var("GREENAUDIT_API_URL").unwrap_or(gateway_defaults.api_url),
            text_model: std::env::var("GREENAUDIT_TEXT_MODEL")
                .unwrap_or(gateway_defaults.text_model),
            vision_model: std::env::var("GREENAUDIT_VISION_MODEL")
                .unwrap_or(gateway_defaults.vision_model),
            text_timeout_secs: env_parse("GREENAUDIT_TEXT_TIMEOUT")
                .unwrap_or(gateway_defaults.text_timeout_secs),
            vision_timeout_secs: env_parse("GREENAUDIT_VISION_TIMEOUT")
                .unwrap_or(gateway_defaults.vision_timeout_secs),
            max_retries: env_parse("GREENAUDIT_MAX_RETRIES")
                .unwrap_or(gateway_defaults.max_retries),
            retry_delay_ms: env_parse("GREENAUDIT_RETRY_DELAY_MS")
                .unwrap_or(gateway_defaults.retry_delay_ms),
            ..gateway_defaults
        };

        let extraction = ExtractionSettings {
            cache_dir: std::env::var("GREENAUDIT_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(extraction_defaults.cache_dir),
            vision_workers: env_parse::<usize>("GREENAUDIT_VISION_WORKERS")
                .filter(|n| *n > 0)
                .unwrap_or(extraction_defaults.vision_workers),
            max_pages: env_parse::<usize>("GREENAUDIT_MAX_PAGES").filter(|n| *n > 0),
            ..extraction_defaults
        };

        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env_parse("SERVER_PORT").unwrap_or(8080),
            gateway,
            extraction,
            verification: VerificationSettings::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            gateway: GatewaySettings::default(),
            extraction: ExtractionSettings::default(),
            verification: VerificationSettings::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.text_timeout_secs, 30);
        assert_eq!(config.gateway.vision_max_tokens, 600);
        assert_eq!(config.gateway.max_retries, 1);
        assert_eq!(config.extraction.vision_workers, 2);
        assert_eq!(config.verification.min_keyword_len, 5);
        assert!((config.verification.keyword_match_threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn retry_delay_doubles() {
        let settings = GatewaySettings {
            retry_delay_ms: 100,
            ..GatewaySettings::default()
        };
        assert_eq!(settings.retry_delay(0), Duration::from_millis(100));
        assert_eq!(settings.retry_delay(1), Duration::from_millis(200));
        assert_eq!(settings.retry_delay(3), Duration::from_millis(800));
    }
}
