// Simulated hub
//
// Stands in for the hardware command surface when no hub is attached:
// the tests and the binary drive it. Bounded moves take the time the
// rated speed implies, then move the encoders and report through the
// PortRegistry from a spawned task, like an interrupt would. Needs to run
// inside a tokio runtime.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use super::completion::{EventSource, PortRegistry};
use super::hub::{Hub, HubCommand, MotorEvent, MotorMode, MotorPort, PairId, PairPort, PortId, StopPolicy};
use super::speed::MotorModel;
use crate::error::HubError;

// How long a zero-speed bounded move sits before the hub calls it stalled
const STALL_DETECT: Duration = Duration::from_millis(500);

/// Most recent commands kept in the log
pub const LOG_CAPACITY: usize = 1024;

#[derive(Debug)]
struct SimMotor {
    model: MotorModel,
    position: i32,
    mode: MotorMode,
    busy: bool,
}

#[derive(Debug, Default)]
struct SimState {
    motors: HashMap<PortId, SimMotor>,
    next_pair: u8,
    log: VecDeque<HubCommand>,
    scripted: HashMap<EventSource, VecDeque<MotorEvent>>,
    in_flight: HashMap<EventSource, JoinHandle<()>>,
}

/// A bounded move in flight: per-port encoder travel and its duration
struct SimMove {
    travel: Vec<(PortId, i32)>,
    duration: Duration,
    stalls: bool,
}

#[derive(Debug, Clone)]
pub struct SimHub {
    state: Arc<Mutex<SimState>>,
    registry: Arc<PortRegistry>,
}

impl SimHub {
    pub fn new(registry: Arc<PortRegistry>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<PortRegistry> {
        &self.registry
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Plug a motor into `port`
    pub fn attach(&self, port: PortId, model: MotorModel) {
        debug!("sim: attach {} on port {}", model.name, port);
        self.lock().motors.insert(
            port,
            SimMotor {
                model,
                position: 0,
                mode: MotorMode::Power,
                busy: false,
            },
        );
    }

    pub fn detach(&self, port: PortId) {
        self.lock().motors.remove(&port);
    }

    /// Encoder position of the motor on `port`
    pub fn position(&self, port: PortId) -> Option<i32> {
        self.lock().motors.get(&port).map(|m| m.position)
    }

    pub fn mode(&self, port: PortId) -> Option<MotorMode> {
        self.lock().motors.get(&port).map(|m| m.mode)
    }

    /// Make the next bounded move on `source` end with `event`
    pub fn script_outcome(&self, source: EventSource, event: MotorEvent) {
        self.lock().scripted.entry(source).or_default().push_back(event);
    }

    /// Commands received so far, oldest first; only the last
    /// `LOG_CAPACITY` are kept
    pub fn commands(&self) -> Vec<HubCommand> {
        self.lock().log.iter().cloned().collect()
    }

    pub fn clear_commands(&self) {
        self.lock().log.clear();
    }

    fn record(&self, command: HubCommand) {
        let mut state = self.lock();
        if state.log.len() == LOG_CAPACITY {
            state.log.pop_front();
        }
        state.log.push_back(command);
    }

    fn with_motor<T>(&self, port: PortId, f: impl FnOnce(&mut SimMotor) -> T) -> Result<T, HubError> {
        let mut state = self.lock();
        state.motors.get_mut(&port).map(f).ok_or(HubError::NoMotor { port })
    }

    fn rated_dps(&self, port: PortId) -> Result<f64, HubError> {
        self.with_motor(port, |m| m.model.max_dps)
    }

    /// Travel time at `pct` percent for `degrees`; None when the motor
    /// would never get there
    fn travel_time(max_dps: f64, pct: i32, degrees: i32) -> Option<Duration> {
        let dps = (pct.abs() as f64) / 100.0 * max_dps;
        if degrees == 0 {
            return Some(Duration::ZERO);
        }
        if dps <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(degrees.unsigned_abs() as f64 / dps))
    }

    fn launch(&self, source: EventSource, mv: SimMove) {
        let mut state = self.lock();
        let mut outcome = state.scripted.get_mut(&source).and_then(|q| q.pop_front());
        if outcome.is_none() && matches!(source, EventSource::Pair(_)) {
            // a stall scripted on one wheel stalls the paired move
            outcome = mv
                .travel
                .iter()
                .find_map(|(port, _)| state.scripted.get_mut(&EventSource::Port(*port)).and_then(|q| q.pop_front()));
        }
        let mut outcome = outcome.unwrap_or(MotorEvent::Completed);
        if mv.stalls {
            outcome = MotorEvent::Stalled;
        }
        for (port, _) in &mv.travel {
            if let Some(m) = state.motors.get_mut(port) {
                m.busy = true;
            }
        }

        // a stalled motor gives up halfway
        let (wait, fraction) = match outcome {
            MotorEvent::Stalled => (mv.duration / 2, 0.5),
            _ => (mv.duration, 1.0),
        };

        let hub = self.clone();
        let travel = mv.travel;
        let handle = tokio::spawn(async move {
            sleep(wait).await;
            hub.finish(source, &travel, fraction, outcome);
        });

        if let Some(previous) = state.in_flight.insert(source, handle) {
            previous.abort();
        }
    }

    fn finish(&self, source: EventSource, travel: &[(PortId, i32)], fraction: f64, outcome: MotorEvent) {
        {
            let mut state = self.lock();
            for (port, degrees) in travel {
                if let Some(m) = state.motors.get_mut(port) {
                    m.position = m.position.saturating_add((*degrees as f64 * fraction).round() as i32);
                    m.busy = false;
                }
            }
            state.in_flight.remove(&source);
        }
        self.registry.dispatch(source, outcome);
    }

    fn halt(&self, source: EventSource, ports: &[PortId]) {
        let aborted = {
            let mut state = self.lock();
            for port in ports {
                if let Some(m) = state.motors.get_mut(port) {
                    m.busy = false;
                }
            }
            state.in_flight.remove(&source).map(|h| h.abort()).is_some()
        };
        if aborted {
            self.registry.dispatch(source, MotorEvent::Interrupted);
        }
    }

    fn single_move(port: PortId, degrees: i32, duration: Option<Duration>) -> SimMove {
        SimMove {
            travel: vec![(port, degrees)],
            duration: duration.unwrap_or(STALL_DETECT),
            stalls: duration.is_none(),
        }
    }
}

impl Hub for SimHub {
    fn motor(&self, port: PortId) -> Option<Box<dyn MotorPort>> {
        if !self.lock().motors.contains_key(&port) {
            return None;
        }
        Some(Box::new(SimPort {
            port,
            hub: self.clone(),
        }))
    }

    fn pair(&self, left: PortId, right: PortId) -> Result<Box<dyn PairPort>, HubError> {
        let mut state = self.lock();
        if left == right || !state.motors.contains_key(&left) || !state.motors.contains_key(&right) {
            return Err(HubError::PairingFailed { left, right });
        }
        state.next_pair = state.next_pair.wrapping_add(1);
        let id = PairId(state.next_pair);
        Ok(Box::new(SimPair {
            id,
            left,
            right,
            hub: self.clone(),
        }))
    }
}

/// One port of a SimHub
pub struct SimPort {
    port: PortId,
    hub: SimHub,
}

impl MotorPort for SimPort {
    fn port(&self) -> PortId {
        self.port
    }

    fn set_mode(&mut self, mode: MotorMode) -> Result<(), HubError> {
        self.hub.with_motor(self.port, |m| m.mode = mode)?;
        self.hub.record(HubCommand::SetMode { port: self.port, mode });
        Ok(())
    }

    fn position(&self) -> i32 {
        self.hub.position(self.port).unwrap_or(0)
    }

    fn preset(&mut self, position: i32) -> Result<(), HubError> {
        self.hub.with_motor(self.port, |m| m.position = position)?;
        self.hub.record(HubCommand::Preset { port: self.port, position });
        Ok(())
    }

    fn run_at_speed(&mut self, speed: i32) -> Result<(), HubError> {
        self.hub.with_motor(self.port, |m| m.busy = speed != 0)?;
        self.hub.record(HubCommand::RunAtSpeed { port: self.port, speed });
        Ok(())
    }

    fn run_for_degrees(&mut self, degrees: i32, speed: i32, stop: StopPolicy) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.port)?;
        self.hub.record(HubCommand::RunForDegrees { port: self.port, degrees, speed, stop });

        let travel = degrees.saturating_mul(speed.signum());
        let duration = SimHub::travel_time(max_dps, speed, degrees);
        let mv = SimHub::single_move(self.port, travel, duration);
        self.hub.launch(EventSource::Port(self.port), mv);
        Ok(())
    }

    fn run_to_position(&mut self, position: i32, speed: i32, stop: StopPolicy) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.port)?;
        self.hub.record(HubCommand::RunToPosition { port: self.port, position, speed, stop });

        let travel = position.saturating_sub(self.position());
        let duration = SimHub::travel_time(max_dps, speed, travel);
        let mv = SimHub::single_move(self.port, travel, duration);
        self.hub.launch(EventSource::Port(self.port), mv);
        Ok(())
    }

    fn run_for_time(&mut self, msec: u32, speed: i32, stop: StopPolicy) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.port)?;
        self.hub.record(HubCommand::RunForTime { port: self.port, msec, speed, stop });

        let degrees = (speed as f64 / 100.0 * max_dps * msec as f64 / 1000.0).round() as i32;
        let mv = SimMove {
            travel: vec![(self.port, degrees)],
            duration: Duration::from_millis(msec as u64),
            stalls: false,
        };
        self.hub.launch(EventSource::Port(self.port), mv);
        Ok(())
    }

    fn stop(&mut self, policy: StopPolicy) {
        self.hub.record(HubCommand::Stop { port: self.port, policy });
        self.hub.halt(EventSource::Port(self.port), &[self.port]);
    }

    fn is_busy(&self) -> bool {
        self.hub.with_motor(self.port, |m| m.busy).unwrap_or(false)
    }
}

/// A pair of SimHub ports
pub struct SimPair {
    id: PairId,
    left: PortId,
    right: PortId,
    hub: SimHub,
}

impl SimPair {
    fn launch_pair(&self, degrees: i32, left: i32, right: i32, duration: Option<Duration>) {
        let fastest = left.abs().max(right.abs());
        let share = |speed: i32| {
            if fastest == 0 {
                0
            } else {
                (degrees as f64 * speed as f64 / fastest as f64).round() as i32
            }
        };
        let mv = SimMove {
            travel: vec![(self.left, share(left)), (self.right, share(right))],
            duration: duration.unwrap_or(STALL_DETECT),
            stalls: duration.is_none(),
        };
        self.hub.launch(EventSource::Pair(self.id), mv);
    }
}

impl PairPort for SimPair {
    fn id(&self) -> PairId {
        self.id
    }

    fn run_at_speed(&mut self, left: i32, right: i32) -> Result<(), HubError> {
        self.hub.with_motor(self.left, |m| m.busy = left != 0)?;
        self.hub.with_motor(self.right, |m| m.busy = right != 0)?;
        self.hub.record(HubCommand::PairRunAtSpeed { pair: self.id, left, right });
        Ok(())
    }

    fn run_for_degrees(&mut self, degrees: i32, left: i32, right: i32, stop: StopPolicy) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.left)?;
        self.hub.record(HubCommand::PairRunForDegrees { pair: self.id, degrees, left, right, stop });

        let fastest = left.abs().max(right.abs());
        let duration = SimHub::travel_time(max_dps, fastest, degrees);
        self.launch_pair(degrees, left, right, duration);
        Ok(())
    }

    fn run_to_position(
        &mut self,
        left_position: i32,
        right_position: i32,
        speed: i32,
        stop: StopPolicy,
    ) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.left)?;
        self.hub.record(HubCommand::PairRunToPosition {
            pair: self.id,
            left_position,
            right_position,
            speed,
            stop,
        });

        let left_travel = left_position.saturating_sub(self.hub.position(self.left).unwrap_or(0));
        let right_travel = right_position.saturating_sub(self.hub.position(self.right).unwrap_or(0));
        let longest = left_travel.saturating_abs().max(right_travel.saturating_abs());
        let duration = SimHub::travel_time(max_dps, speed, longest);
        let mv = SimMove {
            travel: vec![(self.left, left_travel), (self.right, right_travel)],
            duration: duration.unwrap_or(STALL_DETECT),
            stalls: duration.is_none(),
        };
        self.hub.launch(EventSource::Pair(self.id), mv);
        Ok(())
    }

    fn run_for_time(&mut self, msec: u32, left: i32, right: i32, stop: StopPolicy) -> Result<(), HubError> {
        let max_dps = self.hub.rated_dps(self.left)?;
        self.hub.record(HubCommand::PairRunForTime { pair: self.id, msec, left, right, stop });

        let degrees = |speed: i32| (speed as f64 / 100.0 * max_dps * msec as f64 / 1000.0).round() as i32;
        let mv = SimMove {
            travel: vec![(self.left, degrees(left)), (self.right, degrees(right))],
            duration: Duration::from_millis(msec as u64),
            stalls: false,
        };
        self.hub.launch(EventSource::Pair(self.id), mv);
        Ok(())
    }

    fn stop(&mut self, policy: StopPolicy) {
        self.hub.record(HubCommand::PairStop { pair: self.id, policy });
        self.hub.halt(EventSource::Pair(self.id), &[self.left, self.right]);
    }
}
