// Single motor driver
//
// Wraps one hub port: polarity correction, encoder position and the
// completion of each bounded move. Every run_* has two forms:
// start_* issues the move and hands back its Completion, run_* issues it
// and waits for a terminal state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use super::completion::{Completion, CompletionState, EventSource, PortRegistry};
use super::hub::{Hub, MotorMode, MotorPort, Polarity, PortId, StopPolicy};
use super::speed::{MotorModel, SpeedSpec, to_percentage};
use crate::config::CONNECT_POLL_INTERVAL;
use crate::error::{HubError, MotionError, Result};

/// Which way run_to_position travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    Shortest,
}

pub struct Motor {
    device: Box<dyn MotorPort>,
    port: PortId,
    model: MotorModel,
    polarity: Polarity,
    mode: MotorMode,
    registry: Arc<PortRegistry>,
    last: Completion,
}

impl Motor {
    /// Wait for a motor on `port` and put it in position mode
    ///
    /// There is no deadline: an empty port is startup latency, the wait
    /// polls every CONNECT_POLL_INTERVAL until something is plugged in.
    pub async fn connect(
        hub: &dyn Hub,
        registry: Arc<PortRegistry>,
        port: PortId,
        model: MotorModel,
        polarity: Polarity,
    ) -> Result<Self> {
        let mut polls: u32 = 0;
        let device = loop {
            if let Some(device) = hub.motor(port) {
                break device;
            }
            if polls % 10 == 0 {
                info!("Waiting for {} on port {}", model.name, port);
            }
            polls = polls.wrapping_add(1);
            sleep(CONNECT_POLL_INTERVAL).await;
        };

        Self::attach(device, registry, model, polarity)
    }

    /// Like connect(), but give up after `limit`
    pub async fn connect_timeout(
        hub: &dyn Hub,
        registry: Arc<PortRegistry>,
        port: PortId,
        model: MotorModel,
        polarity: Polarity,
        limit: Duration,
    ) -> Result<Self> {
        timeout(limit, Self::connect(hub, registry, port, model, polarity))
            .await
            .map_err(|_| MotionError::NotConnected { port })?
    }

    /// Wrap a port handle that is already connected
    pub fn attach(
        mut device: Box<dyn MotorPort>,
        registry: Arc<PortRegistry>,
        model: MotorModel,
        polarity: Polarity,
    ) -> Result<Self> {
        let port = device.port();
        device.set_mode(MotorMode::Pos)?;
        info!("{}(port {}) connected, polarity {:?}", model.name, port, polarity);

        Ok(Self {
            device,
            port,
            model,
            polarity,
            mode: MotorMode::Pos,
            registry,
            last: Completion::idle(),
        })
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn model(&self) -> &MotorModel {
        &self.model
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn mode(&self) -> MotorMode {
        self.mode
    }

    pub(crate) fn registry(&self) -> &Arc<PortRegistry> {
        &self.registry
    }

    pub fn set_mode(&mut self, mode: MotorMode) -> Result<()> {
        self.device.set_mode(mode)?;
        self.mode = mode;
        Ok(())
    }

    /// Encoder position in degrees
    pub fn position(&self) -> i32 {
        self.device.position()
    }

    /// Preset the encoder to `value`
    pub fn set_position(&mut self, value: i32) -> Result<()> {
        Ok(self.device.preset(value)?)
    }

    /// State of the most recently issued bounded move
    pub fn state(&self) -> CompletionState {
        self.last.state()
    }

    pub fn completion(&self) -> &Completion {
        &self.last
    }

    pub fn is_stalled(&self) -> bool {
        self.state() == CompletionState::Stalled
    }

    pub fn is_interrupted(&self) -> bool {
        self.state() == CompletionState::Interrupted
    }

    pub fn is_running(&self) -> bool {
        self.device.is_busy()
    }

    fn source(&self) -> EventSource {
        EventSource::Port(self.port)
    }

    fn speed_percentage(&self, speed: SpeedSpec) -> Result<i32> {
        to_percentage(speed, &self.model)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.last.is_pending() {
            return Err(MotionError::CommandPending { handle: self.source() });
        }
        Ok(())
    }

    /// Arm a new completion for this port and issue `op` on the device
    fn issue(
        &mut self,
        op: impl FnOnce(&mut dyn MotorPort) -> std::result::Result<(), HubError>,
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

    /// Stop right now. Whatever move was pending ends up Interrupted.
    pub fn stop(&mut self, policy: StopPolicy) {
        debug!("{}: stop {:?}", self, policy);
        self.device.stop(policy);
        if self.registry.is_pending(self.source()) {
            self.registry.disarm(self.source());
        }
    }

    /// Run until stop() is called. No completion is produced.
    pub fn run_at_speed(&mut self, speed: SpeedSpec) -> Result<()> {
        let pct = self.speed_percentage(speed)?;
        self.ensure_idle()?;
        debug!("{}: run_at_speed {}", self, speed);
        self.device.run_at_speed(self.polarity.apply(pct))?;
        self.last = Completion::idle();
        Ok(())
    }

    /// Turn `degrees` (>= 0) at `speed`; the sign of speed picks the
    /// direction. Zero degrees is a no-op.
    pub fn start_for_degrees(
        &mut self,
        degrees: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<Completion> {
        if degrees < 0 {
            return Err(MotionError::InvalidDegrees(degrees));
        }
        let pct = self.speed_percentage(speed)?;
        if degrees == 0 {
            return Ok(Completion::idle());
        }
        self.ensure_idle()?;
        debug!("{}: run_for_degrees {} at speed {}", self, degrees, speed);
        self.issue_for_degrees(degrees, pct, stop)
    }

    pub async fn run_for_degrees(
        &mut self,
        degrees: i32,
        speed: SpeedSpec,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self.start_for_degrees(degrees, speed, stop)?.wait().await)
    }

    fn issue_for_degrees(&mut self, signed_degrees: i32, pct: i32, stop: StopPolicy) -> Result<Completion> {
        let degrees = self.polarity.apply(signed_degrees);
        self.issue(|dev| dev.run_for_degrees(degrees, pct, stop))
    }

    /// Move to `position`
    ///
    /// Clockwise and CounterClockwise turn |current - position| degrees in
    /// that direction and need a position-tracking mode. Shortest leaves
    /// the path to the hub.
    pub fn start_to_position(
        &mut self,
        position: i32,
        speed: SpeedSpec,
        direction: Direction,
        stop: StopPolicy,
    ) -> Result<Completion> {
        let pct = self.speed_percentage(speed)?;

        match direction {
            Direction::Clockwise | Direction::CounterClockwise => {
                if !self.mode.tracks_position() {
                    return Err(MotionError::PositionUntracked {
                        port: self.port,
                        mode: self.mode,
                    });
                }
                let wide = (i64::from(self.position()) - i64::from(position)).abs();
                let delta = i32::try_from(wide).map_err(|_| MotionError::DegreesOutOfRange(wide as f64))?;
                if delta == 0 {
                    return Ok(Completion::idle());
                }
                self.ensure_idle()?;
                debug!(
                    "{}: run_to_position {} {:?} ({} degrees) at speed {}",
                    self, position, direction, delta, speed
                );
                let signed = if direction == Direction::Clockwise { delta } else { -delta };
                self.issue_for_degrees(signed, pct, stop)
            }
            Direction::Shortest => {
                if self.position() == position {
                    return Ok(Completion::idle());
                }
                self.ensure_idle()?;
                debug!("{}: run_to_position {} at speed {}", self, position, speed);
                self.issue(|dev| dev.run_to_position(position, pct, stop))
            }
        }
    }

    pub async fn run_to_position(
        &mut self,
        position: i32,
        speed: SpeedSpec,
        direction: Direction,
        stop: StopPolicy,
    ) -> Result<CompletionState> {
        Ok(self.start_to_position(position, speed, direction, stop)?.wait().await)
    }

    /// Run for `msec` milliseconds. Zero is a no-op.
    pub fn start_for_time(&mut self, msec: u32, speed: SpeedSpec, stop: StopPolicy) -> Result<Completion> {
        let pct = self.speed_percentage(speed)?;
        if msec == 0 {
            return Ok(Completion::idle());
        }
        self.ensure_idle()?;
        debug!("{}: run_for_time {}ms at speed {}", self, msec, speed);
        let pct = self.polarity.apply(pct);
        self.issue(|dev| dev.run_for_time(msec, pct, stop))
    }

    pub async fn run_for_time(&mut self, msec: u32, speed: SpeedSpec, stop: StopPolicy) -> Result<CompletionState> {
        Ok(self.start_for_time(msec, speed, stop)?.wait().await)
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(port {})", self.model.name, self.port)
    }
}

impl fmt::Debug for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motor")
            .field("port", &self.port)
            .field("model", &self.model.name)
            .field("polarity", &self.polarity)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}
