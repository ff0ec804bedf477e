// Paired moves and differential-drive kinematics against the simulated hub

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use spike_drive::config::RobotConfig;
use spike_drive::error::MotionError;
use spike_drive::motor::{
    CompletionState, DifferentialDrive, EventSource, HubCommand, MotorEvent, PairId, PortId, PortRegistry, SimHub,
    SpeedSpec, StopPolicy,
};
use spike_drive::units::Distance;

const PAIR: PairId = PairId(1);

// SPIKE wheel, 110mm track, left motor mounted mirrored
async fn drive_110() -> (SimHub, DifferentialDrive) {
    let config = RobotConfig {
        wheel_track: Distance::Millimeters(110.0),
        ..RobotConfig::default()
    };
    let registry = Arc::new(PortRegistry::new());
    let hub = SimHub::new(Arc::clone(&registry));
    hub.attach(config.left_port, config.motor.model());
    hub.attach(config.right_port, config.motor.model());

    let drive = DifferentialDrive::from_config(&hub, registry, &config).await.unwrap();
    hub.clear_commands();
    (hub, drive)
}

fn pct(p: i32) -> SpeedSpec {
    SpeedSpec::Percent(p)
}

#[tokio::test(start_paused = true)]
async fn test_distance_300mm() {
    let (hub, mut drive) = drive_110().await;

    let outcome = drive.run_for_distance(300.0, pct(40), StopPolicy::Brake).await.unwrap();

    assert_eq!(outcome, CompletionState::Completed);
    assert_eq!(
        hub.commands(),
        vec![HubCommand::PairRunForDegrees {
            pair: PAIR,
            degrees: 614,
            left: -40,
            right: 40,
            stop: StopPolicy::Brake,
        }]
    );
    // both wheels rolled forward, the left encoder counts the other way
    assert_eq!(hub.position(PortId::E), Some(-614));
    assert_eq!(hub.position(PortId::F), Some(614));
}

#[tokio::test(start_paused = true)]
async fn test_distance_units_agree() {
    let (hub, mut drive) = drive_110().await;

    drive
        .run_for_distance(Distance::Centimeters(30.0), pct(40), StopPolicy::Brake)
        .await
        .unwrap();
    drive.run_for_distance(-300.0, pct(40), StopPolicy::Brake).await.unwrap();

    let degrees: Vec<i32> = hub
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            HubCommand::PairRunForDegrees { degrees, .. } => Some(degrees),
            _ => None,
        })
        .collect();
    assert_eq!(degrees, vec![614, -614]);
    assert_eq!(hub.position(PortId::F), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_turn_90_clockwise() {
    let (hub, mut drive) = drive_110().await;

    drive.turn_degrees(90.0, pct(30), StopPolicy::Hold).await.unwrap();
    drive.turn_left(90.0, pct(30), StopPolicy::Hold).await.unwrap();

    assert_eq!(
        hub.commands(),
        vec![
            // (30, -30) with the left side reversed
            HubCommand::PairRunForDegrees {
                pair: PAIR,
                degrees: 177,
                left: -30,
                right: -30,
                stop: StopPolicy::Hold,
            },
            HubCommand::PairRunForDegrees {
                pair: PAIR,
                degrees: 177,
                left: 30,
                right: 30,
                stop: StopPolicy::Hold,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_quarter_arc_right() {
    let (hub, mut drive) = drive_110().await;
    let quarter = 2.0 * PI * 110.0 / 4.0;

    let outcome = drive
        .run_arc_right(110.0, quarter, pct(60), StopPolicy::Brake)
        .await
        .unwrap();

    assert_eq!(outcome, CompletionState::Completed);
    assert_eq!(
        hub.commands(),
        vec![HubCommand::PairRunForDegrees {
            pair: PAIR,
            degrees: 530,
            left: -60,
            right: 20,
            stop: StopPolicy::Brake,
        }]
    );
    // inner wheel covers a third of the outer one
    assert_eq!(hub.position(PortId::E), Some(-530));
    assert_eq!(hub.position(PortId::F), Some(177));
}

#[tokio::test(start_paused = true)]
async fn test_arc_below_min_radius_is_rejected() {
    let (hub, mut drive) = drive_110().await;

    let err = drive
        .start_arc_left(54.0, 100.0, pct(50), StopPolicy::Brake)
        .unwrap_err();

    assert_eq!(
        err,
        MotionError::ArcRadiusTooSmall {
            radius_mm: 54.0,
            min_mm: 55.0
        }
    );
    assert!(hub.commands().is_empty());
    assert_eq!(drive.state(), CompletionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_steering_commands() {
    let (hub, mut drive) = drive_110().await;
    let pair = drive.pair_mut();

    pair.steer_for_degrees(50, pct(50), 360, StopPolicy::Brake).await.unwrap();
    pair.steer_for_degrees(-100, pct(50), 360, StopPolicy::Brake).await.unwrap();

    let speeds: Vec<(i32, i32)> = hub
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            HubCommand::PairRunForDegrees { left, right, .. } => Some((left, right)),
            _ => None,
        })
        .collect();
    // pivot on the right wheel, then spin left; left side reversed
    assert_eq!(speeds, vec![(-50, 0), (50, 50)]);

    assert!(pair.steer_at_speed(101, pct(50)).unwrap_err().is_invalid_argument());
}

#[tokio::test(start_paused = true)]
async fn test_pair_stall_is_reported() {
    let (hub, mut drive) = drive_110().await;
    hub.script_outcome(EventSource::Pair(PAIR), MotorEvent::Stalled);

    let outcome = drive.run_for_distance(300.0, pct(40), StopPolicy::Brake).await.unwrap();

    assert_eq!(outcome, CompletionState::Stalled);
    assert!(drive.pair().is_stalled());
}

#[tokio::test(start_paused = true)]
async fn test_pair_stop_interrupts() {
    let (hub, mut drive) = drive_110().await;

    let done = drive.start_for_distance(1000.0, pct(20), StopPolicy::Brake).unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(done.is_pending());

    let err = drive.start_turn_right(90.0, pct(20), StopPolicy::Brake).unwrap_err();
    assert_eq!(
        err,
        MotionError::CommandPending {
            handle: EventSource::Pair(PAIR)
        }
    );

    drive.stop(StopPolicy::Hold);
    assert_eq!(done.state(), CompletionState::Interrupted);
    assert_eq!(
        hub.commands().last(),
        Some(&HubCommand::PairStop {
            pair: PAIR,
            policy: StopPolicy::Hold,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_pair_blocking_forms() {
    let (hub, mut drive) = drive_110().await;
    let pair = drive.pair_mut();
    let start = Instant::now();

    assert_eq!(
        pair.run_for_time(400, pct(50), pct(-50), StopPolicy::Float).await,
        Ok(CompletionState::Completed)
    );
    assert!(start.elapsed() >= Duration::from_millis(400));

    assert_eq!(
        pair.run_for_degrees(0, pct(50), pct(50), StopPolicy::Float).await,
        Ok(CompletionState::Idle)
    );
    assert_eq!(
        pair.run_to_position(90, -90, pct(50), StopPolicy::Hold).await,
        Ok(CompletionState::Completed)
    );
    assert_eq!(hub.position(PortId::E), Some(90));
    assert_eq!(hub.position(PortId::F), Some(-90));

    assert_eq!(
        hub.commands(),
        vec![
            HubCommand::PairRunForTime {
                pair: PAIR,
                msec: 400,
                left: -50,
                right: -50,
                stop: StopPolicy::Float,
            },
            HubCommand::PairRunToPosition {
                pair: PAIR,
                left_position: 90,
                right_position: -90,
                speed: 50,
                stop: StopPolicy::Hold,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_pairing_needs_both_motors() {
    let registry = Arc::new(PortRegistry::new());
    let hub = SimHub::new(Arc::clone(&registry));
    hub.attach(PortId::E, spike_drive::motor::SPIKE_MEDIUM_MOTOR);
    hub.attach(PortId::F, spike_drive::motor::SPIKE_MEDIUM_MOTOR);
    let config = RobotConfig {
        right_port: PortId::E,
        ..RobotConfig::default()
    };

    let err = DifferentialDrive::from_config(&hub, registry, &config).await.err();
    assert!(matches!(err, Some(MotionError::Hub(_))));
}

#[tokio::test(start_paused = true)]
async fn test_pair_degrees_must_have_a_magnitude() {
    let (hub, mut drive) = drive_110().await;

    let err = drive
        .pair_mut()
        .start_for_degrees(i32::MIN, pct(50), pct(50), StopPolicy::Brake)
        .unwrap_err();

    assert_eq!(err, MotionError::DegreesOutOfRange(i32::MIN as f64));
    assert!(err.is_invalid_argument());
    assert!(hub.commands().is_empty());
    assert_eq!(drive.state(), CompletionState::Idle);

    // the largest negative count that does negate is still accepted
    let outcome = drive
        .pair_mut()
        .start_for_degrees(-i32::MAX, pct(50), pct(50), StopPolicy::Brake)
        .unwrap();
    assert!(outcome.is_pending());
    drive.stop(StopPolicy::Brake);
}

#[tokio::test(start_paused = true)]
async fn test_distance_past_the_encoder_range_is_rejected() {
    let (hub, mut drive) = drive_110().await;

    let err = drive
        .start_for_distance(5.0e12, pct(40), StopPolicy::Brake)
        .unwrap_err();

    assert!(matches!(err, MotionError::DegreesOutOfRange(_)), "{:?}", err);
    assert!(hub.commands().is_empty());
}
