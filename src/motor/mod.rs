// Motor control for a two-wheel SPIKE base
//
// Provides:
// - Speed units and per-model normalisation to hub percentages
// - Hub command surface traits and an in-process simulated hub
// - Completion tracking for commands the hub finishes asynchronously
// - Motor / MotorPair drivers, steering mix and differential kinematics

pub mod completion;
mod driver;
pub mod hub;
pub mod kinematics;
mod pair;
pub mod sim;
pub mod speed;
mod steering;

pub use completion::{wait_all, Completion, CompletionState, EventSource, PortRegistry};
pub use driver::{Direction, Motor};
pub use hub::{Hub, HubCommand, MotorEvent, MotorMode, MotorPort, PairId, PairPort, Polarity, PortId, StopPolicy};
pub use kinematics::{ArcSide, DifferentialDrive, DifferentialKinematics, DriveGeometry, PairMove, WheelSpec};
pub use pair::MotorPair;
pub use sim::SimHub;
pub use speed::{MotorKind, MotorModel, SpeedSpec, SPIKE_LARGE_MOTOR, SPIKE_MEDIUM_MOTOR};
pub use steering::SteeringMixer;
