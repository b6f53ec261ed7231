use std::fmt;

use crate::profile::DeviceProfile;

/// Which axes a combination carries, fixed per profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// operation -> fan -> swing -> temperature
    All,
    /// operation -> fan -> temperature
    Fan,
    /// operation -> swing -> temperature
    Swing,
    /// operation -> temperature
    Bare,
}

/// One concrete point of the command matrix to be learnt.
///
/// Temperature is always the innermost axis, so consecutive combinations from
/// [`enumerate`] share the longest possible non-temperature prefix. The
/// session controller relies on that ordering to spot axis-boundary crossings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Combination {
    All {
        operation: String,
        fan: String,
        swing: String,
        temperature: i32,
    },
    Fan {
        operation: String,
        fan: String,
        temperature: i32,
    },
    Swing {
        operation: String,
        swing: String,
        temperature: i32,
    },
    Bare {
        operation: String,
        temperature: i32,
    },
}

impl Combination {
    pub fn shape(&self) -> Shape {
        match self {
            Combination::All { .. } => Shape::All,
            Combination::Fan { .. } => Shape::Fan,
            Combination::Swing { .. } => Shape::Swing,
            Combination::Bare { .. } => Shape::Bare,
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            Combination::All { operation, .. }
            | Combination::Fan { operation, .. }
            | Combination::Swing { operation, .. }
            | Combination::Bare { operation, .. } => operation,
        }
    }

    pub fn fan(&self) -> Option<&str> {
        match self {
            Combination::All { fan, .. } | Combination::Fan { fan, .. } => Some(fan),
            _ => None,
        }
    }

    pub fn swing(&self) -> Option<&str> {
        match self {
            Combination::All { swing, .. } | Combination::Swing { swing, .. } => Some(swing),
            _ => None,
        }
    }

    pub fn temperature(&self) -> i32 {
        match self {
            Combination::All { temperature, .. }
            | Combination::Fan { temperature, .. }
            | Combination::Swing { temperature, .. }
            | Combination::Bare { temperature, .. } => *temperature,
        }
    }

    /// Ordered key path into the command tree, temperature last.
    pub fn key_path(&self) -> Vec<String> {
        let mut path = vec![self.operation().to_string()];
        if let Some(fan) = self.fan() {
            path.push(fan.to_string());
        }
        if let Some(swing) = self.swing() {
            path.push(swing.to_string());
        }
        path.push(self.temperature().to_string());
        path
    }

    /// All axes except temperature; two combinations in the same group differ
    /// only by temperature.
    pub fn group(&self) -> (String, Option<String>, Option<String>) {
        (
            self.operation().to_string(),
            self.fan().map(str::to_string),
            self.swing().map(str::to_string),
        )
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-> operationModes = {}", self.operation())?;
        if let Some(fan) = self.fan() {
            writeln!(f, "-> fanModes = {fan}")?;
        }
        if let Some(swing) = self.swing() {
            writeln!(f, "-> swingModes = {swing}")?;
        }
        write!(f, "-> temperature = {}", self.temperature())
    }
}

/// Lazily walks the full cross-product of the profile's axes in nested-loop
/// order: operation outermost, then fan, then swing, temperature innermost.
/// Pure function of the profile; calling it again restarts from the top.
pub fn enumerate(profile: &DeviceProfile) -> Box<dyn Iterator<Item = Combination> + '_> {
    match (&profile.fan_modes, &profile.swing_modes) {
        (Some(fans), Some(swings)) => {
            Box::new(profile.operation_modes.iter().flat_map(move |operation| {
                fans.iter().flat_map(move |fan| {
                    swings.iter().flat_map(move |swing| {
                        profile.temperatures().map(move |temperature| Combination::All {
                            operation: operation.clone(),
                            fan: fan.clone(),
                            swing: swing.clone(),
                            temperature,
                        })
                    })
                })
            }))
        }
        (Some(fans), None) => Box::new(profile.operation_modes.iter().flat_map(move |operation| {
            fans.iter().flat_map(move |fan| {
                profile.temperatures().map(move |temperature| Combination::Fan {
                    operation: operation.clone(),
                    fan: fan.clone(),
                    temperature,
                })
            })
        })),
        (None, Some(swings)) => {
            Box::new(profile.operation_modes.iter().flat_map(move |operation| {
                swings.iter().flat_map(move |swing| {
                    profile
                        .temperatures()
                        .map(move |temperature| Combination::Swing {
                            operation: operation.clone(),
                            swing: swing.clone(),
                            temperature,
                        })
                })
            }))
        }
        (None, None) => Box::new(profile.operation_modes.iter().flat_map(move |operation| {
            profile
                .temperatures()
                .map(move |temperature| Combination::Bare {
                    operation: operation.clone(),
                    temperature,
                })
        })),
    }
}
