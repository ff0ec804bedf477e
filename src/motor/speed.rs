// Speed values and motor ratings
//
// The hub only understands a percentage of the motor's rated maximum.
// SpeedSpec lets callers say what they mean (rotations or degrees per
// second/minute) and to_percentage() turns it into that percentage for a
// specific MotorModel.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{MotionError, Result};

/// Rated maximums for one motor model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorModel {
    pub name: &'static str,
    pub max_rps: f64, // rotations per second
    pub max_rpm: f64, // rotations per minute
    pub max_dps: f64, // degrees per second
    pub max_dpm: f64, // degrees per minute
}

/// LEGO SPIKE large angular motor, part 45602
pub const SPIKE_LARGE_MOTOR: MotorModel = MotorModel {
    name: "SpikeLargeMotor",
    max_rps: 2.916666,
    max_rpm: 175.0,
    max_dps: 1050.0,
    max_dpm: 63000.0,
};

/// LEGO SPIKE medium angular motor, part 45603
pub const SPIKE_MEDIUM_MOTOR: MotorModel = MotorModel {
    name: "SpikeMediumMotor",
    max_rps: 2.25,
    max_rpm: 135.0,
    max_dps: 810.0,
    max_dpm: 48600.0,
};

/// Motor models that can be named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorKind {
    SpikeLarge,
    SpikeMedium,
}

impl MotorKind {
    pub fn model(self) -> MotorModel {
        match self {
            MotorKind::SpikeLarge => SPIKE_LARGE_MOTOR,
            MotorKind::SpikeMedium => SPIKE_MEDIUM_MOTOR,
        }
    }
}

impl From<MotorKind> for MotorModel {
    fn from(kind: MotorKind) -> Self {
        kind.model()
    }
}

/// A speed in the unit the caller thinks in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum SpeedSpec {
    Percent(i32),
    RotationsPerSecond(f64),
    RotationsPerMinute(f64),
    DegreesPerSecond(f64),
    DegreesPerMinute(f64),
}

impl From<i32> for SpeedSpec {
    fn from(percent: i32) -> Self {
        SpeedSpec::Percent(percent)
    }
}

impl fmt::Display for SpeedSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedSpec::Percent(p) => write!(f, "{}%", p),
            SpeedSpec::RotationsPerSecond(v) => write!(f, "{} rot/sec", v),
            SpeedSpec::RotationsPerMinute(v) => write!(f, "{} rot/min", v),
            SpeedSpec::DegreesPerSecond(v) => write!(f, "{} deg/sec", v),
            SpeedSpec::DegreesPerMinute(v) => write!(f, "{} deg/min", v),
        }
    }
}

/// Validate a raw percentage
pub fn check_percent(percent: i32) -> Result<i32> {
    if !(-100..=100).contains(&percent) {
        return Err(MotionError::InvalidPercent(percent));
    }
    Ok(percent)
}

/// Convert a speed into a percentage of `model`'s rated maximum
pub fn to_percentage(spec: SpeedSpec, model: &MotorModel) -> Result<i32> {
    let (unit, value, max) = match spec {
        SpeedSpec::Percent(p) => return check_percent(p),
        SpeedSpec::RotationsPerSecond(v) => ("rotations-per-second", v, model.max_rps),
        SpeedSpec::RotationsPerMinute(v) => ("rotations-per-minute", v, model.max_rpm),
        SpeedSpec::DegreesPerSecond(v) => ("degrees-per-second", v, model.max_dps),
        SpeedSpec::DegreesPerMinute(v) => ("degrees-per-minute", v, model.max_dpm),
    };

    if !value.is_finite() {
        return Err(MotionError::InvalidSpeed(value));
    }
    if value.abs() > max {
        return Err(MotionError::SpeedOutOfRange {
            unit,
            model: model.name,
            max,
            requested: value,
        });
    }

    Ok((value / max * 100.0).round() as i32)
}

/// Multiply a speed by `factor`, keeping its unit
///
/// Percentages are rounded back to whole percent; range checking is left
/// to to_percentage().
pub fn scale(spec: SpeedSpec, factor: f64) -> SpeedSpec {
    match spec {
        SpeedSpec::Percent(p) => SpeedSpec::Percent((p as f64 * factor).round() as i32),
        SpeedSpec::RotationsPerSecond(v) => SpeedSpec::RotationsPerSecond(v * factor),
        SpeedSpec::RotationsPerMinute(v) => SpeedSpec::RotationsPerMinute(v * factor),
        SpeedSpec::DegreesPerSecond(v) => SpeedSpec::DegreesPerSecond(v * factor),
        SpeedSpec::DegreesPerMinute(v) => SpeedSpec::DegreesPerMinute(v * factor),
    }
}

/// Order two speeds by what they mean for `model`
pub fn compare(a: SpeedSpec, b: SpeedSpec, model: &MotorModel) -> Result<Ordering> {
    Ok(to_percentage(a, model)?.cmp(&to_percentage(b, model)?))
}
