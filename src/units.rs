// Distance values
//
// Kinematics works in millimeters; callers can hand in any of these.
// A bare number is taken to be millimeters.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const CENTIMETER_MM: f64 = 10.0;
pub const DECIMETER_MM: f64 = 100.0;
pub const METER_MM: f64 = 1000.0;
pub const INCH_MM: f64 = 25.4;
pub const FOOT_MM: f64 = 304.8;
pub const YARD_MM: f64 = 914.4;
/// One LEGO stud
pub const STUD_MM: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Distance {
    Millimeters(f64),
    Centimeters(f64),
    Decimeters(f64),
    Meters(f64),
    Inches(f64),
    Feet(f64),
    Yards(f64),
    Studs(f64),
}

impl Distance {
    /// The distance in millimeters
    pub fn mm(&self) -> f64 {
        match *self {
            Distance::Millimeters(v) => v,
            Distance::Centimeters(v) => v * CENTIMETER_MM,
            Distance::Decimeters(v) => v * DECIMETER_MM,
            Distance::Meters(v) => v * METER_MM,
            Distance::Inches(v) => v * INCH_MM,
            Distance::Feet(v) => v * FOOT_MM,
            Distance::Yards(v) => v * YARD_MM,
            Distance::Studs(v) => v * STUD_MM,
        }
    }
}

impl From<f64> for Distance {
    fn from(mm: f64) -> Self {
        Distance::Millimeters(mm)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Millimeters(v) => write!(f, "{}mm", v),
            Distance::Centimeters(v) => write!(f, "{}cm", v),
            Distance::Decimeters(v) => write!(f, "{}dm", v),
            Distance::Meters(v) => write!(f, "{}m", v),
            Distance::Inches(v) => write!(f, "{}in", v),
            Distance::Feet(v) => write!(f, "{}ft", v),
            Distance::Yards(v) => write!(f, "{}yd", v),
            Distance::Studs(v) => write!(f, "{}stud", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(Distance::Millimeters(600.0).mm(), 600.0);
        assert_eq!(Distance::Centimeters(60.0).mm(), 600.0);
        assert_eq!(Distance::Decimeters(6.0).mm(), 600.0);
        assert_eq!(Distance::Meters(2.0).mm(), 2000.0);
        assert!((Distance::Inches(6.0).mm() - 152.4).abs() < 1e-9);
        assert!((Distance::Feet(3.0).mm() - 914.4).abs() < 1e-9);
        assert!((Distance::Yards(2.0).mm() - 1828.8).abs() < 1e-9);
        assert_eq!(Distance::Studs(11.0).mm(), 88.0);
    }

    #[test]
    fn test_bare_number_is_millimeters() {
        let d: Distance = 300.0.into();
        assert_eq!(d, Distance::Millimeters(300.0));
    }

    #[test]
    fn test_json_shape() {
        let d: Distance = serde_json::from_str(r#"{"unit":"studs","value":19}"#).unwrap();
        assert_eq!(d.mm(), 152.0);
        assert_eq!(d.to_string(), "19stud");
    }
}
