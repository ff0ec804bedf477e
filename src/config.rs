// Poll intervals, default ports, robot configuration
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::motor::hub::{Polarity, PortId, StopPolicy};
use crate::motor::kinematics::{DriveGeometry, WheelSpec};
use crate::motor::speed::MotorKind;
use crate::units::Distance;

// Interval between checks of a pending command while blocking
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

// Interval between checks for a motor to show up on its port
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Default drive ports
pub const DEFAULT_LEFT_PORT: PortId = PortId::E;
pub const DEFAULT_RIGHT_PORT: PortId = PortId::F;

// Stop policy used when a plan step doesn't name one
pub const DEFAULT_STOP: StopPolicy = StopPolicy::Brake;

/// Description of a two-wheel differential-drive robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub left_port: PortId,
    pub right_port: PortId,
    pub motor: MotorKind,
    pub left_polarity: Polarity,
    pub right_polarity: Polarity,
    pub wheel: WheelSpec,
    /// Distance between the midpoints of the two wheels
    pub wheel_track: Distance,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            left_port: DEFAULT_LEFT_PORT,
            right_port: DEFAULT_RIGHT_PORT,
            motor: MotorKind::SpikeMedium,
            // mirrored mounting: equal positive speeds should drive straight
            left_polarity: Polarity::Reversed,
            right_polarity: Polarity::Normal,
            wheel: WheelSpec::SPIKE,
            wheel_track: Distance::Studs(11.0),
        }
    }
}

impl RobotConfig {
    /// Read a JSON config file; missing fields take the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.geometry()?;
        config.wheel.validate()?;
        Ok(config)
    }

    pub fn geometry(&self) -> Result<DriveGeometry, crate::error::MotionError> {
        DriveGeometry::new(self.wheel_track.mm())
    }
}
