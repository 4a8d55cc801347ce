use chrono::Duration;

/// Column family holding every statistics column.
pub const DEFAULT_FAMILY: &str = "default";

/// Default age after which a table's statistics are refreshed.
pub const DEFAULT_MIN_UPDATE_FREQUENCY_MS: i64 = 15 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    pub family: String,
    pub min_update_frequency: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            family: DEFAULT_FAMILY.to_string(),
            min_update_frequency: Duration::milliseconds(DEFAULT_MIN_UPDATE_FREQUENCY_MS),
        }
    }
}

impl StatsConfig {
    /// Read `STATS_COLUMN_FAMILY` and `STATS_MIN_UPDATE_FREQUENCY_MS`,
    /// keeping the default for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let family = match std::env::var("STATS_COLUMN_FAMILY") {
            Ok(val) if !val.is_empty() => val,
            _ => defaults.family,
        };
        let min_update_frequency = match std::env::var("STATS_MIN_UPDATE_FREQUENCY_MS") {
            Ok(val) => val
                .parse::<i64>()
                .ok()
                .filter(|ms| *ms >= 0)
                .map(Duration::milliseconds)
                .unwrap_or(defaults.min_update_frequency),
            Err(_) => defaults.min_update_frequency,
        };
        Self {
            family,
            min_update_frequency,
        }
    }

    pub fn family_bytes(&self) -> &[u8] {
        self.family.as_bytes()
    }
}
