// Two motors moved as one unit
//
// The hub pairs both ports; one command drives both wheels and one event
// completes the whole move. Each side's polarity is corrected on its own
// before a command goes out.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::completion::{Completion, CompletionState, EventSource, PortRegistry};
use super::driver::Motor;
use super::hub::{Hub, PairId, PairPort, Polarity, PortId, StopPolicy};
use super::speed::{MotorModel, SpeedSpec, to_percentage};
use crate::error::{HubError, MotionError, Result};

pub struct MotorPair {
    left: Motor,
    right: Motor,
    device: Box<dyn PairPort>,
    id: PairId,
    registry: Arc<PortRegistry>,
    last: Completion,
}

impl MotorPair {
    /// Pair two connected motors on `hub`
    pub fn new(left: Motor, right: Motor, hub: &dyn Hub) -> Result<Self> {
        let device = hub.pair(left.port(), right.port())?;
        let id = device.id();
        let registry = Arc::clone(left.registry());
        info!("Paired {} (left) with {} (right) as {}", left, right, id);

        Ok(Self {
            left,
            right,
            device,
            id,
            registry,
            last: Completion::idle(),
        })
    }

    /// Connect both motors, then pair them
    pub async fn connect(
        hub: &dyn Hub,
        registry: Arc<PortRegistry>,
        ports: (PortId, PortId),
        model: MotorModel,
        polarity: (Polarity, Polarity),
    ) -> Result<Self> {
        let left = Motor::connect(hub, Arc::clone(&registry), ports.0, model, polarity.0).await?;
        let right = Motor::connect(hub, registry, ports.1, model, polarity.1).await?;
        Self::new(left, right, hub)
    }

    pub fn left(&self) -> &Motor {
        &self.left
    }

    pub fn right(&self) -> &Motor {
        &self.right
    }

    pub fn id(&self) -> PairId {
        self.id
    }

    /// Model the speeds are rated against (the left motor's)
    pub fn model(&self) -> &MotorModel {
        self.left.model()
    }

    pub fn state(&self) -> CompletionState {
        self.last.state()
    }

    pub fn completion(&self) -> &Completion {
        &self.last
    }

    pub fn is_stalled(&self) -> bool {
        self.state() == CompletionState::Stalled
    }

    fn source(&self) -> EventSource {
        EventSource::Pair(self.id)
    }

    pub(crate) fn speed_percentage(&self, speed: SpeedSpec) -> Result<i32> {
        to_percentage(speed, self.model())
    }

    fn with_polarity(&self, left: i32, right: i32) -> (i32, i32) {
        (self.left.polarity().apply(left), self.right.polarity().apply(right))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.last.is_pending() {
            return Err(MotionError::CommandPending { handle: self.source() });
        }
        Ok(())
    }

    fn issue(
        &mut self,
        op: impl FnOnce(&mut dyn PairPort) -> std::result::Result<(), HubError>,
    ) -> Result<Completion> {
        let source = self.source();
        let completion = self.registry.arm(source);
        if let Err(e) = op(self.device.as_mut()) {
            self.registry.disarm(source);
            return Err(e.into());
        }
        self.last = completion.clone();
        Ok(completion)
    }

    /// Stop both motors; a pending move ends up Interrupted
    pub fn stop(&mut self, policy: StopPolicy) {
        debug!("{}: stop {:?}", self, policy);
        self.device.stop(policy);
        if self.registry.is_pending(self.source()) {
            self.registry.disarm(self.source());
        }
    }

    /// Run both sides until stop()
    pub fn run_at_speed(&mut self, left_speed: SpeedSpec, right_speed: SpeedSpec) -> Result<()> {
        let left = self.speed_percentage(left_speed)?;
        let right = self.speed_percentage(right_speed)?;
        self.run_at_percent(left, right)
    }

    pub(crate) fn run_at_percent(&mut self, left: i32, right: i32) -> Result<()> {
        self.ensure_idle()?;
        debug!("{}: run_at_speed left {}%, right {}%", self, left, right);
        let (left, right) = self.with_polarity(left, right);
        self.device.run_at_speed(left, right)?;
        self.last = Completion::idle();
        Ok(())
    }

    /// One synchronized move of nominally `degrees`; the per-wheel travel
    /// follows from the left/right speed ratio. Negative degrees run the
    /// move backwards, zero is a no-op.
    pub fn start_for_degrees(
        &mut self,
        degrees: i32,
        left_speed: SpeedSpec,
        right_speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let left = self.speed_percentage(left_speed)?;
        let right = self.speed_percentage(right_speed)?;
        self.start_for_degrees_percent(degrees, left, right, stop)
    }

    pub(crate) fn start_for_degrees_percent(
        &mut self,
        degrees: i32,
        left: i32,
        right: i32,
        stop: StopPolicy,
    ) -> Result<Completion> {
        if degrees == i32::MIN {
            return Err(MotionError::DegreesOutOfRange(degrees as f64));
        }
        if degrees == 0 {
            return Ok(Completion::idle());
        }
        self.ensure_idle()?;
        debug!(
            "{}: run_for_degrees {} at left_speed {}%, right_speed {}%",
            self, degrees, left, right
        );
        let (left, right) = self.with_polarity(left, right);
        self.issue(|dev| dev.run_for_degrees(degrees, left, right, stop))
    }

    pub async fn run_for_degrees(
        &mut self,
        degrees: i32,
        left_speed: SpeedSpec,
        right_speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self
            .start_for_degrees(degrees, left_speed, right_speed, stop)?
            .wait()
            .await)
    }

    /// Drive each motor to its own target position at `speed`
    pub fn start_to_position(
        &mut self,
        left_position: i32,
        right_position: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let pct = self.speed_percentage(speed)?;
        if self.left.position() == left_position && self.right.position() == right_position {
            return Ok(Completion::idle());
        }
        self.ensure_idle()?;
        debug!(
            "{}: run_to_position left {}, right {} at speed {}",
            self, left_position, right_position, speed
        );
        self.issue(|dev| dev.run_to_position(left_position, right_position, pct, stop))
    }

    pub async fn run_to_position(
        &mut self,
        left_position: i32,
        right_position: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self
            .start_to_position(left_position, right_position, speed, stop)?
            .wait()
            .await)
    }

    /// Run both sides for `msec` milliseconds; zero is a no-op
    pub fn start_for_time(
        &mut self,
        msec: u32,
        left_speed: SpeedSpec,
        right_speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let left = self.speed_percentage(left_speed)?;
        let right = self.speed_percentage(right_speed)?;
        self.start_for_time_percent(msec, left, right, stop)
    }

    pub(crate) fn start_for_time_percent(
        &mut self,
        msec: u32,
        left: i32,
        right: i32,
        stop: StopPolicy,
    ) -> Result<Completion> {
        if msec == 0 {
            return Ok(Completion::idle());
        }
        self.ensure_idle()?;
        debug!(
            "{}: run_for_time {}ms at left_speed {}%, right_speed {}%",
            self, msec, left, right
        );
        let (left, right) = self.with_polarity(left, right);
        self.issue(|dev| dev.run_for_time(msec, left, right, stop))
    }

    pub async fn run_for_time(
        &mut self,
        msec: u32,
        left_speed: SpeedSpec,
        right_speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self
            .start_for_time(msec, left_speed, right_speed, stop)?
            .wait()
            .await)
    }
}

impl fmt::Display for MotorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MotorPair({}+{})", self.left.port(), self.right.port())
    }
}
