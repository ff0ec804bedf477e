// Plan runner
// Executes a list of DriveCommands one after the other, each to a terminal
// state, and reports how every step ended. A stalled step either halts the
// plan or is reported and skipped past, depending on halt_on_stall.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RobotConfig;
use crate::error::Result;
use crate::messages::{DriveCommand, DriveReport};
use crate::motor::{CompletionState, DifferentialDrive, EventSource, MotorEvent, PortId, PortRegistry, SimHub};

pub struct Runtime {
    drive: DifferentialDrive,
    halt_on_stall: bool,
}

impl Runtime {
    pub fn new(drive: DifferentialDrive, halt_on_stall: bool) -> Self {
        Self { drive, halt_on_stall }
    }

    pub fn drive(&self) -> &DifferentialDrive {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut DifferentialDrive {
        &mut self.drive
    }

    /// Run one step and wait for it to finish
    pub async fn execute(&mut self, command: &DriveCommand) -> Result<CompletionState> {
        let drive = &mut self.drive;
        match *command {
            DriveCommand::Distance { distance, speed, stop } => drive.run_for_distance(distance, speed, stop).await,
            DriveCommand::Turn { degrees, speed, stop } => drive.turn_degrees(degrees, speed, stop).await,
            DriveCommand::TurnLeft { degrees, speed, stop } => drive.turn_left(degrees, speed, stop).await,
            DriveCommand::TurnRight { degrees, speed, stop } => drive.turn_right(degrees, speed, stop).await,
            DriveCommand::ArcLeft {
                radius,
                distance,
                speed,
                stop,
            } => drive.run_arc_left(radius, distance, speed, stop).await,
            DriveCommand::ArcRight {
                radius,
                distance,
                speed,
                stop,
            } => drive.run_arc_right(radius, distance, speed, stop).await,
            DriveCommand::Steer {
                steering,
                speed,
                degrees,
                stop,
            } => {
                drive
                    .pair_mut()
                    .steer_for_degrees(steering, speed, degrees, stop)
                    .await
            }
            DriveCommand::Tank {
                left,
                right,
                degrees,
                stop,
            } => drive.pair_mut().run_for_degrees(degrees, left, right, stop).await,
            DriveCommand::ForTime { msec, left, right, stop } => {
                drive.pair_mut().run_for_time(msec, left, right, stop).await
            }
            DriveCommand::Stop { stop } => {
                drive.stop(stop);
                Ok(drive.state())
            }
        }
    }

    /// Run `plan` in order, handing each report to `publish` as soon as the
    /// step ends. An invalid step aborts the plan with its error.
    pub async fn run_plan(
        &mut self,
        plan: &[DriveCommand],
        mut publish: impl FnMut(&DriveReport),
    ) -> Result<Vec<DriveReport>> {
        let mut reports = Vec::with_capacity(plan.len());

        for (step, command) in plan.iter().enumerate() {
            info!("Step {}: {}", step, command);
            let outcome = match self.execute(command).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Step {} ({}) rejected: {}", step, command.name(), e);
                    return Err(e);
                }
            };

            let report = DriveReport {
                step,
                command: command.clone(),
                outcome,
            };
            publish(&report);
            let fell_short = report.fell_short();
            reports.push(report);

            if fell_short {
                if self.halt_on_stall {
                    warn!("Step {} ended {:?}, halting plan", step, outcome);
                    break;
                }
                warn!("Step {} ended {:?}, continuing", step, outcome);
            }
        }

        Ok(reports)
    }
}

/// Options for a plan run from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub halt_on_stall: bool,
    // make the motor on this port stall on its next move
    pub stall: Option<PortId>,
}

/// Drive `plan` on a simulated hub wired up as `config` describes, printing
/// each report as a JSON line
pub async fn run(
    config: &RobotConfig,
    plan: &[DriveCommand],
    options: RunOptions,
) -> std::result::Result<Vec<DriveReport>, Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(PortRegistry::new());
    let hub = SimHub::new(Arc::clone(&registry));
    let model = config.motor.model();
    hub.attach(config.left_port, model);
    hub.attach(config.right_port, model);
    if let Some(port) = options.stall {
        info!("Scripting a stall on port {}", port);
        hub.script_outcome(EventSource::Port(port), MotorEvent::Stalled);
    }

    let drive = DifferentialDrive::from_config(&hub, registry, config).await?;
    let mut runtime = Runtime::new(drive, options.halt_on_stall);

    info!(
        "Runtime started: {} steps, halt_on_stall {}",
        plan.len(),
        options.halt_on_stall
    );

    let reports = runtime
        .run_plan(plan, |report| match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode report: {}", e),
        })
        .await?;

    info!("Plan finished after {} of {} steps", reports.len(), plan.len());
    Ok(reports)
}
