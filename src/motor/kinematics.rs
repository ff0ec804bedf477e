// Differential-drive kinematics for a two-wheel base
//
// Converts straight runs, turns on the spot and arcs into one
// synchronized MotorPair move: a wheel-rotation target in degrees plus a
// left/right speed split. Curvature comes from the speed ratio, not from
// different degree counts, because both wheels finish on one event.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::completion::{Completion, CompletionState, PortRegistry};
use super::hub::{Hub, StopPolicy};
use super::pair::MotorPair;
use super::speed::SpeedSpec;
use crate::config::RobotConfig;
use crate::error::{MotionError, Result};
use crate::units::Distance;

/// Wheel dimensions in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelSpec {
    pub diameter_mm: f64,
    pub width_mm: f64,
}

impl WheelSpec {
    /// SPIKE Prime wheel, part 39367
    pub const SPIKE: WheelSpec = WheelSpec {
        diameter_mm: 56.0,
        width_mm: 14.0,
    };

    /// SPIKE large wheel, part 49295
    pub const SPIKE_LARGE: WheelSpec = WheelSpec {
        diameter_mm: 88.0,
        width_mm: 14.0,
    };

    pub fn new(diameter_mm: f64, width_mm: f64) -> Result<Self> {
        let wheel = Self { diameter_mm, width_mm };
        wheel.validate()?;
        Ok(wheel)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.diameter_mm.is_finite() && self.diameter_mm > 0.0) {
            return Err(MotionError::InvalidGeometry(format!(
                "wheel diameter {}mm must be positive",
                self.diameter_mm
            )));
        }
        Ok(())
    }

    pub fn circumference_mm(&self) -> f64 {
        self.diameter_mm * PI
    }

    pub fn radius_mm(&self) -> f64 {
        self.diameter_mm / 2.0
    }
}

/// Placement of the two wheels on the robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveGeometry {
    /// Distance between the wheel midpoints. Often needs tuning on the
    /// real robot; weight and balance move the effective contact points.
    pub wheel_track_mm: f64,
}

impl DriveGeometry {
    pub fn new(wheel_track_mm: f64) -> Result<Self> {
        if !(wheel_track_mm.is_finite() && wheel_track_mm > 0.0) {
            return Err(MotionError::InvalidGeometry(format!(
                "wheel track {}mm must be positive",
                wheel_track_mm
            )));
        }
        Ok(Self { wheel_track_mm })
    }

    /// Circle each wheel follows when the robot spins on the spot
    pub fn rotate_circumference_mm(&self) -> f64 {
        self.wheel_track_mm * PI
    }

    /// Smallest arc radius the center of the robot can follow
    pub fn min_arc_radius_mm(&self) -> f64 {
        self.wheel_track_mm / 2.0
    }
}

/// One synchronized pair move: degrees target and per-side percent speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairMove {
    pub degrees: i32,
    pub left: i32,
    pub right: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcSide {
    Right, // clockwise
    Left,  // counter-clockwise
}

/// Pure planning: no hardware involved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialKinematics {
    pub wheel: WheelSpec,
    pub geometry: DriveGeometry,
}

impl DifferentialKinematics {
    pub fn new(wheel: WheelSpec, geometry: DriveGeometry) -> Self {
        Self { wheel, geometry }
    }

    /// Wheel rotation in degrees to roll `travel_mm` along the ground
    ///
    /// Fails when the rotation does not fit a hub command (±i32::MAX).
    pub fn wheel_degrees(&self, travel_mm: f64) -> Result<i32> {
        let degrees = (travel_mm / self.wheel.circumference_mm() * 360.0).round();
        if !(degrees.abs() <= i32::MAX as f64) {
            return Err(MotionError::DegreesOutOfRange(degrees));
        }
        Ok(degrees as i32)
    }

    /// Straight line: both wheels at `speed` for the distance's worth of rotation
    pub fn plan_distance(&self, distance_mm: f64, speed: i32) -> Result<PairMove> {
        check_finite(distance_mm)?;
        Ok(PairMove {
            degrees: self.wheel_degrees(distance_mm)?,
            left: speed,
            right: speed,
        })
    }

    /// Spin on the spot; positive `degrees` is clockwise
    pub fn plan_turn(&self, degrees: f64, speed: i32) -> Result<PairMove> {
        check_finite(degrees)?;
        let wheel_travel_mm = degrees.abs() / 360.0 * self.geometry.rotate_circumference_mm();
        let wheel_degrees = self.wheel_degrees(wheel_travel_mm)?;
        let (left, right) = if degrees >= 0.0 { (speed, -speed) } else { (-speed, speed) };

        Ok(PairMove {
            degrees: wheel_degrees,
            left,
            right,
        })
    }

    pub fn check_radius(&self, radius_mm: f64) -> Result<()> {
        let min_mm = self.geometry.min_arc_radius_mm();
        // negated so that NaN is rejected as well
        if !(radius_mm >= min_mm) {
            return Err(MotionError::ArcRadiusTooSmall { radius_mm, min_mm });
        }
        Ok(())
    }

    /// Drive `distance_mm` along a circle of `radius_mm` (measured at the
    /// robot's center). The outer wheel runs at `speed`, the inner one is
    /// slowed by the ratio of the two wheel circles, and the degree target
    /// is the outer wheel's travel.
    pub fn plan_arc(&self, radius_mm: f64, distance_mm: f64, speed: i32, side: ArcSide) -> Result<PairMove> {
        self.check_radius(radius_mm)?;
        check_finite(distance_mm)?;

        let half_track = self.geometry.wheel_track_mm / 2.0;
        let circle_outer_mm = 2.0 * PI * (radius_mm + half_track);
        let circle_middle_mm = 2.0 * PI * radius_mm;
        let circle_inner_mm = 2.0 * PI * (radius_mm - half_track);

        let outer_speed = speed;
        let inner_speed = (speed as f64 * circle_inner_mm / circle_outer_mm).round() as i32;

        let outer_travel_mm = distance_mm * circle_outer_mm / circle_middle_mm;
        let degrees = self.wheel_degrees(outer_travel_mm)?;

        let (left, right) = match side {
            ArcSide::Right => (outer_speed, inner_speed),
            ArcSide::Left => (inner_speed, outer_speed),
        };

        Ok(PairMove { degrees, left, right })
    }
}

fn check_finite(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(MotionError::InvalidDistance(value));
    }
    Ok(())
}

/// A differential-drive base: kinematics on top of a MotorPair
pub struct DifferentialDrive {
    pair: MotorPair,
    kinematics: DifferentialKinematics,
}

impl DifferentialDrive {
    pub fn new(pair: MotorPair, wheel: WheelSpec, geometry: DriveGeometry) -> Self {
        Self {
            pair,
            kinematics: DifferentialKinematics::new(wheel, geometry),
        }
    }

    /// Connect and pair the drive motors described by `config`
    pub async fn from_config(hub: &dyn Hub, registry: Arc<PortRegistry>, config: &RobotConfig) -> Result<Self> {
        config.wheel.validate()?;
        let geometry = config.geometry()?;
        let pair = MotorPair::connect(
            hub,
            registry,
            (config.left_port, config.right_port),
            config.motor.model(),
            (config.left_polarity, config.right_polarity),
        )
        .await?;

        info!(
            "Differential drive ready: wheel {}mm, track {}mm",
            config.wheel.diameter_mm, geometry.wheel_track_mm
        );
        Ok(Self::new(pair, config.wheel, geometry))
    }

    pub fn kinematics(&self) -> &DifferentialKinematics {
        &self.kinematics
    }

    pub fn pair(&self) -> &MotorPair {
        &self.pair
    }

    pub fn pair_mut(&mut self) -> &mut MotorPair {
        &mut self.pair
    }

    pub fn state(&self) -> CompletionState {
        self.pair.state()
    }

    pub fn stop(&mut self, policy: StopPolicy) {
        self.pair.stop(policy);
    }

    fn execute(&mut self, mv: PairMove, stop: StopPolicy) -> Result<Completion> {
        self.pair
            .start_for_degrees_percent(mv.degrees, mv.left, mv.right, stop)
    }

    /// Drive straight; `distance` is how far the wheel midpoint travels
    pub fn start_for_distance(
        &mut self,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let distance = distance.into();
        let speed = self.pair.speed_percentage(speed)?;
        let mv = self.kinematics.plan_distance(distance.mm(), speed)?;
        debug!("{}: run_for_distance {} -> {:?}", self, distance, mv);
        self.execute(mv, stop)
    }

    pub async fn run_for_distance(
        &mut self,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self.start_for_distance(distance, speed, stop)?.wait().await)
    }

    /// Rotate in place; positive is clockwise
    pub fn start_turn_degrees(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<Completion> {
        let speed = self.pair.speed_percentage(speed)?;
        let mv = self.kinematics.plan_turn(degrees, speed)?;
        debug!("{}: turn_degrees {} -> {:?}", self, degrees, mv);
        self.execute(mv, stop)
    }

    pub async fn turn_degrees(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<CompletionState> {
        Ok(self.start_turn_degrees(degrees, speed, stop)?.wait().await)
    }

    pub fn start_turn_right(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<Completion> {
        self.start_turn_degrees(degrees.abs(), speed, stop)
    }

    pub async fn turn_right(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<CompletionState> {
        self.turn_degrees(degrees.abs(), speed, stop).await
    }

    pub fn start_turn_left(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<Completion> {
        self.start_turn_degrees(-degrees.abs(), speed, stop)
    }

    pub async fn turn_left(&mut self, degrees: f64, speed: SpeedSpec, stop: StopPolicy) -> Result<CompletionState> {
        self.turn_degrees(-degrees.abs(), speed, stop).await
    }

    /// Drive along a circle of `radius` for `distance`, bending right or left
    pub fn start_arc(
        &mut self,
        side: ArcSide,
        radius: impl Into<Distance>,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let radius_mm = radius.into().mm();
        let distance_mm = distance.into().mm();
        self.kinematics.check_radius(radius_mm)?;
        let speed = self.pair.speed_percentage(speed)?;
        let mv = self.kinematics.plan_arc(radius_mm, distance_mm, speed, side)?;
        debug!(
            "{}: arc {:?}, radius {}mm, distance {}mm -> {:?}",
            self, side, radius_mm, distance_mm, mv
        );
        self.execute(mv, stop)
    }

    pub fn start_arc_right(
        &mut self,
        radius: impl Into<Distance>,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        self.start_arc(ArcSide::Right, radius, distance, speed, stop)
    }

    pub async fn run_arc_right(
        &mut self,
        radius: impl Into<Distance>,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self.start_arc_right(radius, distance, speed, stop)?.wait().await)
    }

    pub fn start_arc_left(
        &mut self,
        radius: impl Into<Distance>,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        self.start_arc(ArcSide::Left, radius, distance, speed, stop)
    }

    pub async fn run_arc_left(
        &mut self,
        radius: impl Into<Distance>,
        distance: impl Into<Distance>,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self.start_arc_left(radius, distance, speed, stop)?.wait().await)
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DifferentialDrive({}+{})", self.pair.left().port(), self.pair.right().port())
    }
}
