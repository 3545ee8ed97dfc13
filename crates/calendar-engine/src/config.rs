//! Engine tunables.

use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

fn default_epoch_year() -> i64 {
    1970
}

fn default_months_across() -> usize {
    3
}

fn default_max_search_iterations() -> usize {
    1000
}

/// Settings shared by the layout builder and recurrence patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Year number assigned to the year containing timestamp 0.
    #[serde(default = "default_epoch_year")]
    pub epoch_year: i64,
    /// Months per layout group.
    #[serde(default = "default_months_across")]
    pub months_across: usize,
    /// Candidate bound for `next_occurrence`.
    #[serde(default = "default_max_search_iterations")]
    pub max_search_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch_year: default_epoch_year(),
            months_across: default_months_across(),
            max_search_iterations: default_max_search_iterations(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON, filling missing fields with defaults, then validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| CalendarError::InvalidConfiguration(format!("engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_epoch_year(mut self, epoch_year: i64) -> Self {
        self.epoch_year = epoch_year;
        self
    }

    pub fn with_months_across(mut self, months_across: usize) -> Self {
        self.months_across = months_across;
        self
    }

    pub fn with_max_search_iterations(mut self, max: usize) -> Self {
        self.max_search_iterations = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.months_across == 0 {
            return Err(CalendarError::InvalidConfiguration(
                "months_across must be at least 1".to_string(),
            ));
        }
        if self.max_search_iterations == 0 {
            return Err(CalendarError::InvalidConfiguration(
                "max_search_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.epoch_year, 1970);
        assert_eq!(config.months_across, 3);
        assert_eq!(config.max_search_iterations, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = EngineConfig::from_json(r#"{"epoch_year": 0}"#).unwrap();
        assert_eq!(config.epoch_year, 0);
        assert_eq!(config.months_across, 3);
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"months_across": 0}"#),
            Err(CalendarError::InvalidConfiguration(_))
        ));
        assert!(EngineConfig::from_json(r#"{"max_search_iterations": 0}"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_serializes_round_trip() {
        let config = EngineConfig::default().with_months_across(4).with_epoch_year(1);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
