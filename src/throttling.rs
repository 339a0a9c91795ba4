// Throttling settings for load simulation
//
// The simulator and the speed-index coefficients both depend on the network
// and CPU conditions being emulated. Presets mirror the two profiles used by
// lab tooling; custom profiles load from TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Network and CPU conditions for a simulated page load
///
/// # Example
/// ```
/// use lantern::throttling::ThrottlingSettings;
///
/// let settings = ThrottlingSettings::default();
/// assert_eq!(settings.rtt_ms, 150.0); // mobile slow 4G
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottlingSettings {
    /// Round-trip time (ms)
    ///
    /// Applied once per request, three times when a new connection must be opened.
    pub rtt_ms: f64,

    /// Downlink throughput (kilobits per second)
    pub throughput_kbps: f64,

    /// CPU slowdown applied to recorded main-thread task durations
    ///
    /// 1.0 replays tasks at recorded speed, 4.0 emulates a mid-tier phone.
    pub cpu_slowdown_multiplier: f64,
}

impl Default for ThrottlingSettings {
    fn default() -> Self {
        Self::mobile_slow_4g()
    }
}

impl ThrottlingSettings {
    /// Mobile slow 4G: 150ms RTT, 1.6Mbps, 4x CPU slowdown
    pub fn mobile_slow_4g() -> Self {
        Self {
            rtt_ms: 150.0,
            throughput_kbps: 1.6 * 1024.0,
            cpu_slowdown_multiplier: 4.0,
        }
    }

    /// Desktop dense 4G: 40ms RTT, 10Mbps, no CPU slowdown
    pub fn desktop_dense_4g() -> Self {
        Self {
            rtt_ms: 40.0,
            throughput_kbps: 10.0 * 1024.0,
            cpu_slowdown_multiplier: 1.0,
        }
    }

    /// Parse settings from a TOML document
    ///
    /// ```
    /// use lantern::throttling::ThrottlingSettings;
    ///
    /// let settings = ThrottlingSettings::from_toml_str(
    ///     "rtt_ms = 40.0\nthroughput_kbps = 10240.0\ncpu_slowdown_multiplier = 1.0",
    /// ).unwrap();
    /// assert_eq!(settings, ThrottlingSettings::desktop_dense_4g());
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Self = toml::from_str(input).context("Invalid throttling TOML")?;
        settings.validate().map_err(anyhow::Error::msg)?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read throttling profile {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load throttling profile {}", path.display()))
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if !self.rtt_ms.is_finite() || self.rtt_ms < 0.0 {
            return Err(format!("rtt_ms must be a non-negative number, got {}", self.rtt_ms));
        }

        if !self.throughput_kbps.is_finite() || self.throughput_kbps <= 0.0 {
            return Err(format!(
                "throughput_kbps must be positive, got {}",
                self.throughput_kbps
            ));
        }

        if !self.cpu_slowdown_multiplier.is_finite() || self.cpu_slowdown_multiplier <= 0.0 {
            return Err(format!(
                "cpu_slowdown_multiplier must be positive, got {}",
                self.cpu_slowdown_multiplier
            ));
        }

        Ok(())
    }

    /// Cache key used when memoizing simulators per settings
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.rtt_ms, self.throughput_kbps, self.cpu_slowdown_multiplier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(ThrottlingSettings::mobile_slow_4g().validate().is_ok());
        assert!(ThrottlingSettings::desktop_dense_4g().validate().is_ok());
    }

    #[test]
    fn test_default_is_mobile() {
        assert_eq!(
            ThrottlingSettings::default(),
            ThrottlingSettings::mobile_slow_4g()
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = ThrottlingSettings::default();
        settings.rtt_ms = -1.0;
        assert!(settings.validate().unwrap_err().contains("rtt_ms"));

        let mut settings = ThrottlingSettings::default();
        settings.throughput_kbps = 0.0;
        assert!(settings.validate().unwrap_err().contains("throughput_kbps"));

        let mut settings = ThrottlingSettings::default();
        settings.cpu_slowdown_multiplier = f64::NAN;
        assert!(settings
            .validate()
            .unwrap_err()
            .contains("cpu_slowdown_multiplier"));
    }

    #[test]
    fn test_toml_rejects_invalid_profile() {
        let err = ThrottlingSettings::from_toml_str(
            "rtt_ms = 40.0\nthroughput_kbps = 0.0\ncpu_slowdown_multiplier = 1.0",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("throughput_kbps"));
    }

    #[test]
    fn test_toml_missing_field() {
        assert!(ThrottlingSettings::from_toml_str("rtt_ms = 40.0").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(
            &path,
            "rtt_ms = 150.0\nthroughput_kbps = 1638.4\ncpu_slowdown_multiplier = 4.0\n",
        )
        .unwrap();

        let settings = ThrottlingSettings::from_file(&path).unwrap();
        assert_eq!(settings, ThrottlingSettings::mobile_slow_4g());
    }

    #[test]
    fn test_cache_key_distinguishes_profiles() {
        assert_ne!(
            ThrottlingSettings::mobile_slow_4g().cache_key(),
            ThrottlingSettings::desktop_dense_4g().cache_key()
        );
    }
}
