//! Engine configuration and validation.

use std::error::Error;
use std::fmt;

/// Configuration for a simulation session.
///
/// Validated once at session construction; invalid values are
/// unrecoverable startup failures surfaced to the embedder, not
/// runtime conditions.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Simulated-seconds per real-second clock multiplier. Default: 1.0.
    pub speed: f64,
    /// Modeling interval for in-progress motions, simulated seconds.
    /// The interval is shortened near motion completion. Default: 0.1.
    pub motion_step_secs: f64,
    /// Cap on the duration of a single requested motion, simulated
    /// seconds. Default: 60.
    pub max_motion_secs: f64,
    /// Per-client heartbeat interval, simulated seconds. Default: 2.0.
    pub heartbeat_secs: f64,
    /// Real seconds of client silence before a `Timeout` event is
    /// emitted. Default: 30.
    pub idle_timeout_secs: f64,
    /// Minimum real milliseconds between snapshot offers to the state
    /// exchange; earlier offers are silently skipped. Default: 50.
    pub min_frame_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            motion_step_secs: 0.1,
            max_motion_secs: 60.0,
            heartbeat_secs: 2.0,
            idle_timeout_secs: 30.0,
            min_frame_interval_ms: 50,
        }
    }
}

impl EngineConfig {
    /// Check structural invariants. Called by `Session::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed { value: self.speed });
        }
        if !self.motion_step_secs.is_finite() || self.motion_step_secs <= 0.0 {
            return Err(ConfigError::InvalidMotionStep {
                value: self.motion_step_secs,
            });
        }
        if !self.max_motion_secs.is_finite() || self.max_motion_secs <= 0.0 {
            return Err(ConfigError::InvalidMotionCap {
                value: self.max_motion_secs,
            });
        }
        if !self.heartbeat_secs.is_finite() || self.heartbeat_secs <= 0.0 {
            return Err(ConfigError::InvalidHeartbeat {
                value: self.heartbeat_secs,
            });
        }
        if !self.idle_timeout_secs.is_finite() || self.idle_timeout_secs <= 0.0 {
            return Err(ConfigError::InvalidIdleTimeout {
                value: self.idle_timeout_secs,
            });
        }
        Ok(())
    }
}

/// Errors detected during [`EngineConfig::validate`] or session startup.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Clock speed is NaN, infinite, zero, or negative.
    InvalidSpeed {
        /// The invalid value.
        value: f64,
    },
    /// Motion modeling interval is not finite and positive.
    InvalidMotionStep {
        /// The invalid value.
        value: f64,
    },
    /// Motion duration cap is not finite and positive.
    InvalidMotionCap {
        /// The invalid value.
        value: f64,
    },
    /// Heartbeat interval is not finite and positive.
    InvalidHeartbeat {
        /// The invalid value.
        value: f64,
    },
    /// Idle timeout is not finite and positive.
    InvalidIdleTimeout {
        /// The invalid value.
        value: f64,
    },
    /// The simulation thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpeed { value } => {
                write!(f, "speed must be finite and positive, got {value}")
            }
            Self::InvalidMotionStep { value } => {
                write!(f, "motion_step_secs must be finite and positive, got {value}")
            }
            Self::InvalidMotionCap { value } => {
                write!(f, "max_motion_secs must be finite and positive, got {value}")
            }
            Self::InvalidHeartbeat { value } => {
                write!(f, "heartbeat_secs must be finite and positive, got {value}")
            }
            Self::InvalidIdleTimeout { value } => {
                write!(f, "idle_timeout_secs must be finite and positive, got {value}")
            }
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "simulation thread spawn failed: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn bad_speed_is_rejected() {
        let config = EngineConfig {
            speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpeed { .. })
        ));

        let config = EngineConfig {
            speed: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpeed { .. })
        ));
    }

    #[test]
    fn bad_intervals_are_rejected() {
        let config = EngineConfig {
            motion_step_secs: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMotionStep { .. })
        ));

        let config = EngineConfig {
            heartbeat_secs: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHeartbeat { .. })
        ));
    }
}
