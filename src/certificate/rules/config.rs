use serde::{Deserialize, Serialize};

use super::RuleConfigError;

/// Tunable bounds used by the standard rule catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Lower bound (exclusive) of the age window for the pregnancy question.
    pub childbearing_min_age: u32,
    /// Upper bound (exclusive) of the age window for the pregnancy question.
    pub childbearing_max_age: u32,
    /// Above this age in whole years the fetal and infant section is locked.
    pub neonatal_age_limit_years: u32,
    pub surgery_lookback_weeks: u32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            childbearing_min_age: 10,
            childbearing_max_age: 50,
            neonatal_age_limit_years: 1,
            surgery_lookback_weeks: 4,
        }
    }
}

impl RuleConfig {
    /// Both bounds are exclusive, so at least one whole age must lie between them.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        if self.childbearing_min_age.saturating_add(1) >= self.childbearing_max_age {
            return Err(RuleConfigError::EmptyAgeWindow {
                min: self.childbearing_min_age,
                max: self.childbearing_max_age,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_valid() {
        assert_eq!(RuleConfig::default().validate(), Ok(()));
    }

    #[test]
    fn window_without_a_whole_age_inside_is_rejected() {
        for (min, max) in [(50, 10), (20, 20), (20, 21)] {
            let config = RuleConfig {
                childbearing_min_age: min,
                childbearing_max_age: max,
                ..RuleConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(RuleConfigError::EmptyAgeWindow { min, max }),
                "({min}, {max})"
            );
        }
    }
}
