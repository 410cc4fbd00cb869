//! Configuration for the sync layer.

use chrono::Duration;
use kizuna_core::SamplingPolicy;
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section falls back to its defaults when
/// omitted from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Goals store (short anti-thrash window)
    pub goals: GoalsConfig,
    /// Achievements store
    pub achievements: StoreConfig,
    /// Companion store
    pub companion: StoreConfig,
    /// User store
    pub user: UserConfig,
    /// Background sync loop
    pub coordinator: CoordinatorConfig,
    /// Wall clock used for day, week and hour rules
    pub clock: ClockConfig,
    /// Dialogue selection
    pub dialogue: DialogueConfig,
}

impl SyncConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalsConfig {
    pub cooldown_ms: u64,
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self { cooldown_ms: 5000 }
    }
}

impl GoalsConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.cooldown_ms).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub cooldown_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300, // 5 minutes
        }
    }
}

impl StoreConfig {
    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub cooldown_secs: u64,
    /// Cap on the newest-first session history
    pub recent_sessions_limit: usize,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            recent_sessions_limit: kizuna_core::focus::RECENT_SESSIONS_LIMIT,
        }
    }
}

impl UserConfig {
    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub interval_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl CoordinatorConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Minutes east of UTC
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub sampling: SamplingPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.goals.cooldown_ms, 5000);
        assert_eq!(config.achievements.cooldown_secs, 300);
        assert_eq!(config.companion.cooldown_secs, 300);
        assert_eq!(config.user.recent_sessions_limit, 10);
        assert_eq!(config.coordinator.interval_secs, 300);
        assert_eq!(config.dialogue.sampling, SamplingPolicy::FullPool);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "goals:\n  cooldown_ms: 100\nclock:\n  utc_offset_minutes: 540\ndialogue:\n  sampling: top_tier\n";
        let config = SyncConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.goals.cooldown(), Duration::milliseconds(100));
        assert_eq!(config.clock.utc_offset_minutes, 540);
        assert_eq!(config.dialogue.sampling, SamplingPolicy::TopTier);
        assert_eq!(config.user.cooldown_secs, 300);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = SyncConfig::default();
        config.user.recent_sessions_limit = 3;
        let yaml = config.to_yaml().unwrap();
        let parsed = SyncConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.user.recent_sessions_limit, 3);
    }
}
