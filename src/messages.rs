// Message types for the plan runner

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_STOP;
use crate::motor::{CompletionState, SpeedSpec, StopPolicy};
use crate::units::Distance;

// One step of a motion plan, read from JSON:
//   {"command": "distance", "distance": {"unit": "cm", "value": 30}, "speed": {"unit": "percent", "value": 40}}
// `stop` is optional and defaults to `DEFAULT_STOP`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DriveCommand {
    Distance {
        distance: Distance,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    // positive degrees turn clockwise
    Turn {
        degrees: f64,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    TurnLeft {
        degrees: f64,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    TurnRight {
        degrees: f64,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    ArcLeft {
        radius: Distance,
        distance: Distance,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    ArcRight {
        radius: Distance,
        distance: Distance,
        speed: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    Steer {
        steering: i32,
        speed: SpeedSpec,
        degrees: i32,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    Tank {
        left: SpeedSpec,
        right: SpeedSpec,
        degrees: i32,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    ForTime {
        msec: u32,
        left: SpeedSpec,
        right: SpeedSpec,
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
    Stop {
        #[serde(default = "default_stop")]
        stop: StopPolicy,
    },
}

fn default_stop() -> StopPolicy {
    DEFAULT_STOP
}

impl DriveCommand {
    /// Parse a whole plan (a JSON array of steps)
    pub fn parse_plan(text: &str) -> serde_json::Result<Vec<DriveCommand>> {
        serde_json::from_str(text)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriveCommand::Distance { .. } => "distance",
            DriveCommand::Turn { .. } => "turn",
            DriveCommand::TurnLeft { .. } => "turn_left",
            DriveCommand::TurnRight { .. } => "turn_right",
            DriveCommand::ArcLeft { .. } => "arc_left",
            DriveCommand::ArcRight { .. } => "arc_right",
            DriveCommand::Steer { .. } => "steer",
            DriveCommand::Tank { .. } => "tank",
            DriveCommand::ForTime { .. } => "for_time",
            DriveCommand::Stop { .. } => "stop",
        }
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveCommand::Distance { distance, speed, .. } => write!(f, "distance {} at {}", distance, speed),
            DriveCommand::Turn { degrees, speed, .. }
            | DriveCommand::TurnLeft { degrees, speed, .. }
            | DriveCommand::TurnRight { degrees, speed, .. } => {
                write!(f, "{} {} degrees at {}", self.name(), degrees, speed)
            }
            DriveCommand::ArcLeft { radius, distance, speed, .. }
            | DriveCommand::ArcRight { radius, distance, speed, .. } => {
                write!(f, "{} radius {} for {} at {}", self.name(), radius, distance, speed)
            }
            DriveCommand::Steer { steering, speed, degrees, .. } => {
                write!(f, "steer {} at {} for {} degrees", steering, speed, degrees)
            }
            DriveCommand::Tank { left, right, degrees, .. } => {
                write!(f, "tank {}/{} for {} degrees", left, right, degrees)
            }
            DriveCommand::ForTime { msec, left, right, .. } => {
                write!(f, "for_time {}ms at {}/{}", msec, left, right)
            }
            DriveCommand::Stop { stop } => write!(f, "stop ({:?})", stop),
        }
    }
}

// Outcome of one plan step, printed as a JSON line by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveReport {
    pub step: usize,
    pub command: DriveCommand,
    pub outcome: CompletionState,
}

impl DriveReport {
    /// Stalled or Interrupted: the move did not get where it was sent
    pub fn fell_short(&self) -> bool {
        matches!(self.outcome, CompletionState::Stalled | CompletionState::Interrupted)
    }
}
