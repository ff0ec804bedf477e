// Steering mix for a motor pair
//
// steering -100..100 picks how hard to turn:
//    0   straight, both sides at speed
//   ±50  inner side stopped, pivot around that wheel
//  ±100  inner side at -speed, spin on the spot
// Positive steering turns right (the right side is the inner one).

use super::completion::{Completion, CompletionState};
use super::hub::StopPolicy;
use super::pair::MotorPair;
use super::speed::SpeedSpec;
use crate::error::{MotionError, Result};

pub struct SteeringMixer;

impl SteeringMixer {
    /// Split `speed` into (left, right) for `steering`
    pub fn mix(steering: i32, speed: f64) -> Result<(f64, f64)> {
        if !(-100..=100).contains(&steering) {
            return Err(MotionError::InvalidSteering(steering));
        }
        let factor = (50.0 - (steering as f64).abs()) / 50.0;
        if steering >= 0 {
            Ok((speed, speed * factor))
        } else {
            Ok((speed * factor, speed))
        }
    }

    /// mix() on whole percentages, rounding the scaled side
    pub fn mix_percent(steering: i32, speed: i32) -> Result<(i32, i32)> {
        let (left, right) = Self::mix(steering, speed as f64)?;
        Ok((left.round() as i32, right.round() as i32))
    }
}

impl MotorPair {
    fn steering_percent(&self, steering: i32, speed: SpeedSpec) -> Result<(i32, i32)> {
        if !(-100..=100).contains(&steering) {
            return Err(MotionError::InvalidSteering(steering));
        }
        SteeringMixer::mix_percent(steering, self.speed_percentage(speed)?)
    }

    /// Run with `steering` until stop()
    pub fn steer_at_speed(&mut self, steering: i32, speed: SpeedSpec) -> Result<()> {
        let (left, right) = self.steering_percent(steering, speed)?;
        self.run_at_percent(left, right)
    }

    /// Steer for `degrees` of the faster (outer) motor
    pub fn start_steering_for_degrees(
        &mut self,
        steering: i32,
        speed: SpeedSpec,
        degrees: i32,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let (left, right) = self.steering_percent(steering, speed)?;
        self.start_for_degrees_percent(degrees, left, right, stop)
    }

    pub async fn steer_for_degrees(
        &mut self,
        steering: i32,
        speed: SpeedSpec,
        degrees: i32,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self
            .start_steering_for_degrees(steering, speed, degrees, stop)?
            .wait()
            .await)
    }

    pub fn start_steering_for_time(
        &mut self,
        msec: u32,
        steering: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let (left, right) = self.steering_percent(steering, speed)?;
        self.start_for_time_percent(msec, left, right, stop)
    }

    pub async fn steer_for_time(
        &mut self,
        msec: u32,
        steering: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self
            .start_steering_for_time(msec, steering, speed, stop)?
            .wait()
            .await)
    }
}
