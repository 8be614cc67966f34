use crate::error::{Result, WarmupError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides [`WarmupConfig::base_url`].
pub const API_URL_ENV: &str = "WARMUP_API_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5189";

/// Upper bound for every millisecond setting (one day). Timers are scheduled
/// as `now + period`, which has to stay representable.
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// WarmupConfig
// ---------------------------------------------------------------------------

/// Timing and endpoint settings for one waiting screen.
///
/// Every field has a default, so an empty YAML document (or no file at all)
/// yields the stock 5s probe / 3s cadence / 20 attempt policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_message_interval_ms")]
    pub message_interval_ms: u64,
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,
    #[serde(default = "default_progress_horizon_secs")]
    pub progress_horizon_secs: u64,
    #[serde(default = "default_progress_cap")]
    pub progress_cap: f64,
    /// Elapsed seconds after which the failure view shows regardless of
    /// how many attempts have completed.
    #[serde(default = "default_failure_margin_secs")]
    pub failure_margin_secs: u64,
    #[serde(default = "default_tip_after_secs")]
    pub tip_after_secs: u64,
    #[serde(default = "default_tip_before_secs")]
    pub tip_before_secs: u64,
    #[serde(default = "default_free_tier_note_after_secs")]
    pub free_tier_note_after_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_dispatch_interval_ms() -> u64 {
    3_000
}

fn default_max_attempts() -> u32 {
    20
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_message_interval_ms() -> u64 {
    3_000
}

fn default_grace_delay_ms() -> u64 {
    500
}

fn default_progress_horizon_secs() -> u64 {
    60
}

fn default_progress_cap() -> f64 {
    90.0
}

fn default_failure_margin_secs() -> u64 {
    65
}

fn default_tip_after_secs() -> u64 {
    20
}

fn default_tip_before_secs() -> u64 {
    50
}

fn default_free_tier_note_after_secs() -> u64 {
    10
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            health_path: default_health_path(),
            probe_timeout_ms: default_probe_timeout_ms(),
            dispatch_interval_ms: default_dispatch_interval_ms(),
            max_attempts: default_max_attempts(),
            tick_interval_ms: default_tick_interval_ms(),
            message_interval_ms: default_message_interval_ms(),
            grace_delay_ms: default_grace_delay_ms(),
            progress_horizon_secs: default_progress_horizon_secs(),
            progress_cap: default_progress_cap(),
            failure_margin_secs: default_failure_margin_secs(),
            tip_after_secs: default_tip_after_secs(),
            tip_before_secs: default_tip_before_secs(),
            free_tier_note_after_secs: default_free_tier_note_after_secs(),
        }
    }
}

impl WarmupConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WarmupError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        // An empty file is a valid "all defaults" document.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: WarmupConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Replace `base_url` with `WARMUP_API_URL` when it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.base_url = url.to_string();
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Full URL of the readiness endpoint.
    pub fn health_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.health_path.starts_with('/') {
            format!("{base}{}", self.health_path)
        } else {
            format!("{base}/{}", self.health_path)
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn message_interval(&self) -> Duration {
        Duration::from_millis(self.message_interval_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    /// Longest the poller can keep dispatching before it gives up:
    /// `max_attempts × dispatch_interval`. `None` if that overflows.
    pub fn worst_case_wait(&self) -> Option<Duration> {
        self.dispatch_interval().checked_mul(self.max_attempts)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };
        let warning = |message: String| ConfigWarning {
            level: WarnLevel::Warning,
            message,
        };

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            warnings.push(error(format!(
                "base_url '{}' must start with http:// or https://",
                self.base_url
            )));
        }

        for (name, value) in [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("dispatch_interval_ms", self.dispatch_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("message_interval_ms", self.message_interval_ms),
            ("progress_horizon_secs", self.progress_horizon_secs),
        ] {
            if value == 0 {
                warnings.push(error(format!("{name} must be greater than zero")));
            }
        }

        for (name, value) in [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("dispatch_interval_ms", self.dispatch_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("message_interval_ms", self.message_interval_ms),
            ("grace_delay_ms", self.grace_delay_ms),
        ] {
            if value > MAX_INTERVAL_MS {
                warnings.push(error(format!(
                    "{name} ({value}) must be at most {MAX_INTERVAL_MS} (one day)"
                )));
            }
        }

        if self.max_attempts == 0 {
            warnings.push(error("max_attempts must be greater than zero".into()));
        }

        if !(0.0..100.0).contains(&self.progress_cap) {
            warnings.push(error(format!(
                "progress_cap {} must be in [0, 100); 100% is reserved for a ready backend",
                self.progress_cap
            )));
        }

        if self.tip_after_secs >= self.tip_before_secs {
            warnings.push(warning(format!(
                "tip window ({}s, {}s) is empty; the tip will never show",
                self.tip_after_secs, self.tip_before_secs
            )));
        }

        match self.worst_case_wait() {
            Some(worst) if self.failure_margin_secs <= worst.as_secs() => {
                warnings.push(warning(format!(
                    "failure_margin_secs ({}) does not exceed the worst-case wait of {}s; \
                     the elapsed-time failure will fire before the retry budget runs out",
                    self.failure_margin_secs,
                    worst.as_secs()
                )));
            }
            Some(_) => {}
            None => warnings.push(error(format!(
                "max_attempts ({}) × dispatch_interval_ms ({}) overflows",
                self.max_attempts, self.dispatch_interval_ms
            ))),
        }

        warnings
    }

    /// Fail with the first error-level finding of [`validate`](Self::validate).
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(WarmupError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_stock_policy() {
        let cfg = WarmupConfig::default();
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.dispatch_interval(), Duration::from_secs(3));
        assert_eq!(cfg.max_attempts, 20);
        assert_eq!(cfg.worst_case_wait(), Some(Duration::from_secs(60)));
        assert_eq!(cfg.failure_margin_secs, 65);
        assert_eq!(cfg.grace_delay(), Duration::from_millis(500));
        assert_eq!(cfg.health_url(), "http://localhost:5189/api/health");
    }

    #[test]
    fn defaults_are_valid() {
        assert!(WarmupConfig::default().validate().is_empty());
        assert!(WarmupConfig::default().ensure_valid().is_ok());
    }

    #[test]
    fn health_url_normalizes_slashes() {
        let cfg = WarmupConfig {
            base_url: "https://api.example.com/".into(),
            health_path: "healthz".into(),
            ..Default::default()
        };
        assert_eq!(cfg.health_url(), "https://api.example.com/healthz");
    }

    #[test]
    fn load_partial_yaml_keeps_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "base_url: https://backend.example.com").unwrap();
        writeln!(f, "max_attempts: 5").unwrap();
        let cfg = WarmupConfig::load(f.path()).unwrap();
        assert_eq!(cfg.base_url, "https://backend.example.com");
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.probe_timeout_ms, 5_000);
        assert_eq!(cfg.health_path, "/api/health");
    }

    #[test]
    fn load_empty_file_is_default() {
        let f = NamedTempFile::new().unwrap();
        let cfg = WarmupConfig::load(f.path()).unwrap();
        assert_eq!(cfg, WarmupConfig::default());
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = WarmupConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, WarmupError::ConfigNotFound(_)));
    }

    #[test]
    fn load_malformed_yaml_errors() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "max_attempts: [not, a, number]").unwrap();
        let err = WarmupConfig::load(f.path()).unwrap_err();
        assert!(matches!(err, WarmupError::Yaml(_)));
    }

    #[test]
    fn zero_interval_is_an_error() {
        let cfg = WarmupConfig {
            dispatch_interval_ms: 0,
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("dispatch_interval_ms")));
        assert!(matches!(
            cfg.ensure_valid(),
            Err(WarmupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn huge_budget_is_an_error_not_a_panic() {
        let cfg = WarmupConfig {
            dispatch_interval_ms: u64::MAX,
            max_attempts: u32::MAX,
            ..Default::default()
        };
        assert_eq!(cfg.worst_case_wait(), None);
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("overflows")));
        assert!(matches!(
            cfg.ensure_valid(),
            Err(WarmupError::InvalidConfig(_))
        ));
    }

    #[test]
    fn interval_longer_than_a_day_is_an_error() {
        let cfg = WarmupConfig {
            grace_delay_ms: MAX_INTERVAL_MS + 1,
            failure_margin_secs: u64::MAX,
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("grace_delay_ms"));
        assert!(cfg.ensure_valid().is_err());

        let at_limit = WarmupConfig {
            dispatch_interval_ms: MAX_INTERVAL_MS,
            max_attempts: 1,
            failure_margin_secs: u64::MAX,
            ..Default::default()
        };
        assert!(at_limit.ensure_valid().is_ok());
    }

    #[test]
    fn progress_cap_of_100_is_rejected() {
        let cfg = WarmupConfig {
            progress_cap: 100.0,
            ..Default::default()
        };
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn short_failure_margin_is_only_a_warning() {
        let cfg = WarmupConfig {
            failure_margin_secs: 30,
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(cfg.ensure_valid().is_ok());
    }

    #[test]
    fn bad_scheme_is_an_error() {
        let cfg = WarmupConfig {
            base_url: "localhost:5189".into(),
            ..Default::default()
        };
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn yaml_roundtrip_preserves_values() {
        let cfg = WarmupConfig {
            max_attempts: 7,
            ..Default::default()
        };
        let yaml = cfg.to_yaml().unwrap();
        let back: WarmupConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cfg);
    }
}
