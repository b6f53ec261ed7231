use thiserror::Error;

use crate::combinations::Combination;
use crate::profile::DeviceProfile;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("--no-temp-on-mode refers to an unknown operating mode: {0}")]
    UnknownTemperatureMode(String),
    #[error("--no-swing-on-mode refers to an unknown operating mode: {0}")]
    UnknownSwingMode(String),
    #[error("add swing modes to the json file or do not use --no-swing-on-mode")]
    SwingAxisMissing,
    #[error("mode {0} cannot be listed in both --no-temp-on-mode and --no-swing-on-mode")]
    ConflictingModes(String),
}

/// Outcome of the per-combination skip check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    /// Capture the code.
    None,
    /// Reuse the code captured at this mode's minimum temperature.
    ReuseTemperature,
    /// Reuse the code cached for this (temperature, fan mode) pair.
    ReuseSwing,
}

/// Operator-declared axes that do not vary for certain operating modes.
///
/// Validated against the profile up front so a contradictory invocation fails
/// before the first capture, not halfway through a session.
#[derive(Debug, Clone, Default)]
pub struct SkipPolicy {
    no_temp_modes: Vec<String>,
    no_swing_modes: Vec<String>,
}

impl SkipPolicy {
    pub fn new(
        profile: &DeviceProfile,
        no_temp_modes: Vec<String>,
        no_swing_modes: Vec<String>,
    ) -> Result<Self, PolicyError> {
        if let Some(mode) = no_temp_modes
            .iter()
            .find(|m| !profile.operation_modes.contains(m))
        {
            return Err(PolicyError::UnknownTemperatureMode(mode.clone()));
        }
        if let Some(mode) = no_swing_modes
            .iter()
            .find(|m| !profile.operation_modes.contains(m))
        {
            return Err(PolicyError::UnknownSwingMode(mode.clone()));
        }
        if !no_swing_modes.is_empty() && profile.swing_modes.is_none() {
            return Err(PolicyError::SwingAxisMissing);
        }
        // A mode on both lists would make the swing cache seeding ambiguous,
        // refuse it instead of guessing.
        if let Some(mode) = no_temp_modes.iter().find(|m| no_swing_modes.contains(m)) {
            return Err(PolicyError::ConflictingModes(mode.clone()));
        }
        Ok(Self {
            no_temp_modes,
            no_swing_modes,
        })
    }

    /// Rule order matters: the temperature rule is checked last and wins over
    /// a tentative swing decision.
    pub fn decide(&self, combination: &Combination) -> SkipDecision {
        let mut decision = SkipDecision::None;
        if combination.swing().is_some()
            && self
                .no_swing_modes
                .iter()
                .any(|m| m == combination.operation())
        {
            decision = SkipDecision::ReuseSwing;
        }
        if self
            .no_temp_modes
            .iter()
            .any(|m| m == combination.operation())
        {
            decision = SkipDecision::ReuseTemperature;
        }
        decision
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile(swing: bool) -> DeviceProfile {
        DeviceProfile {
            min_temperature: 18,
            max_temperature: 20,
            precision: 1,
            operation_modes: vec!["cool".into(), "heat".into()],
            fan_modes: None,
            swing_modes: swing.then(|| vec!["up".into(), "down".into()]),
        }
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!(matches!(
            SkipPolicy::new(&profile(true), vec!["boost".into()], vec![]),
            Err(PolicyError::UnknownTemperatureMode(m)) if m == "boost"
        ));
        assert!(matches!(
            SkipPolicy::new(&profile(true), vec![], vec!["boost".into()]),
            Err(PolicyError::UnknownSwingMode(m)) if m == "boost"
        ));
    }

    #[test]
    fn rejects_swing_option_without_swing_axis() {
        assert!(matches!(
            SkipPolicy::new(&profile(false), vec![], vec!["heat".into()]),
            Err(PolicyError::SwingAxisMissing)
        ));
    }

    #[test]
    fn rejects_mode_on_both_lists() {
        assert!(matches!(
            SkipPolicy::new(&profile(true), vec!["heat".into()], vec!["heat".into()]),
            Err(PolicyError::ConflictingModes(m)) if m == "heat"
        ));
    }

    #[test]
    fn temperature_rule_applies_to_listed_mode_only() {
        let policy = SkipPolicy::new(&profile(false), vec!["heat".into()], vec![]).unwrap();
        let heat = Combination::Bare {
            operation: "heat".into(),
            temperature: 19,
        };
        let cool = Combination::Bare {
            operation: "cool".into(),
            temperature: 19,
        };
        assert_eq!(policy.decide(&heat), SkipDecision::ReuseTemperature);
        assert_eq!(policy.decide(&cool), SkipDecision::None);
    }

    #[test]
    fn swing_rule_needs_a_swing_axis_on_the_combination() {
        let policy = SkipPolicy::new(&profile(true), vec![], vec!["heat".into()]).unwrap();
        let with_swing = Combination::Swing {
            operation: "heat".into(),
            swing: "up".into(),
            temperature: 18,
        };
        let without_swing = Combination::Bare {
            operation: "heat".into(),
            temperature: 18,
        };
        assert_eq!(policy.decide(&with_swing), SkipDecision::ReuseSwing);
        assert_eq!(policy.decide(&without_swing), SkipDecision::None);
    }

    #[test]
    fn temperature_wins_over_swing_for_different_modes() {
        let policy =
            SkipPolicy::new(&profile(true), vec!["cool".into()], vec!["heat".into()]).unwrap();
        let cool = Combination::Swing {
            operation: "cool".into(),
            swing: "up".into(),
            temperature: 19,
        };
        assert_eq!(policy.decide(&cool), SkipDecision::ReuseTemperature);
    }
}
