// Hardware command surface
//
// What the core needs from a hub: per-port motor access and the ability
// to pair two ports into one synchronized unit. Speeds that cross this
// boundary are already normalized, polarity-corrected percentages.
//
// Completion of a bounded move is not reported through these traits. The
// hub's event source hands (EventSource, MotorEvent) to a PortRegistry
// instead, see completion.rs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HubError;

/// Hub port letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortId {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl PortId {
    pub const ALL: [PortId; 6] = [PortId::A, PortId::B, PortId::C, PortId::D, PortId::E, PortId::F];
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            PortId::A => "A",
            PortId::B => "B",
            PortId::C => "C",
            PortId::D => "D",
            PortId::E => "E",
            PortId::F => "F",
        };
        f.write_str(letter)
    }
}

impl std::str::FromStr for PortId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PortId::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid port {:?}, expected A-F", s))
    }
}

/// Identity of a hardware-synchronized motor pair, assigned by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairId(pub u8);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair #{}", self.0)
    }
}

/// Motor device modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorMode {
    Power,
    Speed,
    Pos,
    APos, // absolute position, limited to -180..180
    Load,
    Calib,
}

impl MotorMode {
    /// Modes in which the encoder position is meaningful
    pub fn tracks_position(self) -> bool {
        matches!(self, MotorMode::Pos | MotorMode::APos)
    }
}

/// Whether a motor's forward is the robot's forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Normal,
    Reversed,
}

impl Polarity {
    /// Apply this polarity to a signed degree count or speed
    pub fn apply(self, value: i32) -> i32 {
        match self {
            Polarity::Normal => value,
            Polarity::Reversed => -value,
        }
    }
}

/// What a motor does the moment a move ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    Float, // coast
    #[default]
    Brake,
    Hold,
}

/// Terminal outcome reported by the hub for one bounded move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorEvent {
    Completed,
    Interrupted,
    Stalled,
}

/// Every command that reached a hub, as recorded by hubs that keep a log
#[derive(Debug, Clone, PartialEq)]
pub enum HubCommand {
    SetMode { port: PortId, mode: MotorMode },
    Preset { port: PortId, position: i32 },
    RunAtSpeed { port: PortId, speed: i32 },
    RunForDegrees { port: PortId, degrees: i32, speed: i32, stop: StopPolicy },
    RunToPosition { port: PortId, position: i32, speed: i32, stop: StopPolicy },
    RunForTime { port: PortId, msec: u32, speed: i32, stop: StopPolicy },
    Stop { port: PortId, policy: StopPolicy },
    PairRunAtSpeed { pair: PairId, left: i32, right: i32 },
    PairRunForDegrees { pair: PairId, degrees: i32, left: i32, right: i32, stop: StopPolicy },
    PairRunToPosition {
        pair: PairId,
        left_position: i32,
        right_position: i32,
        speed: i32,
        stop: StopPolicy,
    },
    PairRunForTime { pair: PairId, msec: u32, left: i32, right: i32, stop: StopPolicy },
    PairStop { pair: PairId, policy: StopPolicy },
}

/// One motor port on a hub
pub trait MotorPort {
    fn port(&self) -> PortId;

    fn set_mode(&mut self, mode: MotorMode) -> Result<(), HubError>;

    /// Encoder position in degrees
    fn position(&self) -> i32;

    /// Overwrite the encoder position
    fn preset(&mut self, position: i32) -> Result<(), HubError>;

    fn run_at_speed(&mut self, speed: i32) -> Result<(), HubError>;

    fn run_for_degrees(&mut self, degrees: i32, speed: i32, stop: StopPolicy) -> Result<(), HubError>;

    fn run_to_position(&mut self, position: i32, speed: i32, stop: StopPolicy) -> Result<(), HubError>;

    fn run_for_time(&mut self, msec: u32, speed: i32, stop: StopPolicy) -> Result<(), HubError>;

    /// Float, brake or hold right now. Never fails on a connected port.
    fn stop(&mut self, policy: StopPolicy);

    fn is_busy(&self) -> bool;
}

/// Two ports paired by the hub; one command moves both, one event completes both
pub trait PairPort {
    fn id(&self) -> PairId;

    fn run_at_speed(&mut self, left: i32, right: i32) -> Result<(), HubError>;

    fn run_for_degrees(
        &mut self,
        degrees: i32,
        left: i32,
        right: i32,
        stop: StopPolicy,
    ) -> Result<(), HubError>;

    fn run_to_position(
        &mut self,
        left_position: i32,
        right_position: i32,
        speed: i32,
        stop: StopPolicy,
    ) -> Result<(), HubError>;

    fn run_for_time(&mut self, msec: u32, left: i32, right: i32, stop: StopPolicy) -> Result<(), HubError>;

    fn stop(&mut self, policy: StopPolicy);
}

/// A hub with motor ports
pub trait Hub {
    /// The motor on `port`, or None while nothing is connected there
    fn motor(&self, port: PortId) -> Option<Box<dyn MotorPort>>;

    fn pair(&self, left: PortId, right: PortId) -> Result<Box<dyn PairPort>, HubError>;
}
