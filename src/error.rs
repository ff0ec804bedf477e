// Error types for the motion layer
//
// Argument problems are reported before anything reaches the hub.
// Stalls and interruptions are not errors: they show up as a
// CompletionState on the command that produced them.

use crate::motor::completion::EventSource;
use crate::motor::hub::{MotorMode, PortId};

/// Failures reported by the hardware command surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HubError {
    #[error("No motor attached to port {port}")]
    NoMotor { port: PortId },

    #[error("Hub refused to pair ports {left} and {right}")]
    PairingFailed { left: PortId, right: PortId },

    #[error("Port {port} rejected mode {mode:?}")]
    ModeRejected { port: PortId, mode: MotorMode },
}

/// Errors returned by Motor, MotorPair and the drive layers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MotionError {
    #[error("{0} is an invalid percentage, must be between -100 and 100 (inclusive)")]
    InvalidPercent(i32),

    #[error("Invalid {unit}: max for {model} is {max}, {requested} was requested")]
    SpeedOutOfRange {
        unit: &'static str,
        model: &'static str,
        max: f64,
        requested: f64,
    },

    #[error("Speed {0} is not a finite number")]
    InvalidSpeed(f64),

    #[error("Degrees {0} is invalid, must be zero or positive")]
    InvalidDegrees(i32),

    #[error("Distance {0} is not a finite number")]
    InvalidDistance(f64),

    #[error("Move of {0} degrees does not fit a hub command")]
    DegreesOutOfRange(f64),

    #[error("{0} is an invalid steering, must be between -100 and 100 (inclusive)")]
    InvalidSteering(i32),

    #[error("Arc radius {radius_mm}mm is less than the minimum {min_mm}mm")]
    ArcRadiusTooSmall { radius_mm: f64, min_mm: f64 },

    #[error("Invalid drive geometry: {0}")]
    InvalidGeometry(String),

    #[error("Motor on port {port} is in {mode:?} mode, position is not tracked")]
    PositionUntracked { port: PortId, mode: MotorMode },

    #[error("{handle} still has a pending command, stop it or wait for it first")]
    CommandPending { handle: EventSource },

    #[error("No motor connected on port {port}")]
    NotConnected { port: PortId },

    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

impl MotionError {
    /// True for the argument-validation family, which is always raised
    /// before any hardware interaction.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            MotionError::InvalidPercent(_)
                | MotionError::SpeedOutOfRange { .. }
                | MotionError::InvalidSpeed(_)
                | MotionError::InvalidDegrees(_)
                | MotionError::InvalidDistance(_)
                | MotionError::DegreesOutOfRange(_)
                | MotionError::InvalidSteering(_)
                | MotionError::ArcRadiusTooSmall { .. }
                | MotionError::InvalidGeometry(_)
        )
    }
}

/// Errors while loading a RobotConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid robot config: {0}")]
    Invalid(#[from] MotionError),
}

pub type Result<T> = std::result::Result<T, MotionError>;
