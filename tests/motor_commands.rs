// Single-motor behaviour against the simulated hub

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use spike_drive::error::MotionError;
use spike_drive::motor::{
    wait_all, CompletionState, Direction, EventSource, HubCommand, Motor, MotorEvent, MotorMode, Polarity, PortId,
    PortRegistry, SimHub, SpeedSpec, StopPolicy, SPIKE_MEDIUM_MOTOR,
};

fn hub_with(ports: &[PortId]) -> SimHub {
    let hub = SimHub::new(Arc::new(PortRegistry::new()));
    for port in ports {
        hub.attach(*port, SPIKE_MEDIUM_MOTOR);
    }
    hub
}

async fn connect(hub: &SimHub, port: PortId, polarity: Polarity) -> Motor {
    let motor = Motor::connect(hub, Arc::clone(hub.registry()), port, SPIKE_MEDIUM_MOTOR, polarity)
        .await
        .unwrap();
    hub.clear_commands();
    motor
}

#[tokio::test(start_paused = true)]
async fn test_connect_sets_position_mode() {
    let hub = hub_with(&[PortId::A]);
    let motor = Motor::connect(&hub, Arc::clone(hub.registry()), PortId::A, SPIKE_MEDIUM_MOTOR, Polarity::Normal)
        .await
        .unwrap();

    assert_eq!(motor.mode(), MotorMode::Pos);
    assert_eq!(hub.mode(PortId::A), Some(MotorMode::Pos));
    assert_eq!(motor.state(), CompletionState::Idle);
    assert_eq!(motor.to_string(), "SpikeMediumMotor(port A)");
}

#[tokio::test(start_paused = true)]
async fn test_connect_waits_for_late_motor() {
    let hub = hub_with(&[]);
    let start = Instant::now();

    let plug_in = async {
        sleep(Duration::from_millis(350)).await;
        hub.attach(PortId::C, SPIKE_MEDIUM_MOTOR);
    };
    let connecting = Motor::connect(&hub, Arc::clone(hub.registry()), PortId::C, SPIKE_MEDIUM_MOTOR, Polarity::Normal);
    let (motor, ()) = tokio::join!(connecting, plug_in);

    assert_eq!(motor.unwrap().port(), PortId::C);
    assert!(start.elapsed() >= Duration::from_millis(350));
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_gives_up() {
    let hub = hub_with(&[]);
    let err = Motor::connect_timeout(
        &hub,
        Arc::clone(hub.registry()),
        PortId::A,
        SPIKE_MEDIUM_MOTOR,
        Polarity::Normal,
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();

    assert_eq!(err, MotionError::NotConnected { port: PortId::A });
}

#[tokio::test(start_paused = true)]
async fn test_zero_amounts_are_no_ops() {
    let hub = hub_with(&[PortId::E]);
    let mut motor = connect(&hub, PortId::E, Polarity::Normal).await;

    let done = motor.start_for_degrees(0, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap();
    assert_eq!(done.state(), CompletionState::Idle);
    assert_eq!(motor.run_for_time(0, SpeedSpec::Percent(50), StopPolicy::Brake).await, Ok(CompletionState::Idle));
    assert_eq!(
        motor
            .run_to_position(0, SpeedSpec::Percent(50), Direction::Clockwise, StopPolicy::Brake)
            .await,
        Ok(CompletionState::Idle)
    );

    assert!(hub.commands().is_empty());
    assert_eq!(motor.state(), CompletionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_zero_amount_keeps_previous_outcome() {
    let hub = hub_with(&[PortId::E]);
    let mut motor = connect(&hub, PortId::E, Polarity::Normal).await;

    hub.script_outcome(EventSource::Port(PortId::E), MotorEvent::Stalled);
    assert_eq!(
        motor.run_for_degrees(90, SpeedSpec::Percent(50), StopPolicy::Brake).await,
        Ok(CompletionState::Stalled)
    );

    motor.start_for_degrees(0, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap();
    assert!(motor.is_stalled());
}

#[tokio::test(start_paused = true)]
async fn test_polarity_is_applied_before_the_hub() {
    let hub = hub_with(&[PortId::E]);
    let mut motor = connect(&hub, PortId::E, Polarity::Reversed).await;

    motor.run_for_degrees(90, SpeedSpec::Percent(50), StopPolicy::Hold).await.unwrap();
    motor.run_for_time(200, SpeedSpec::Percent(30), StopPolicy::Float).await.unwrap();
    motor.run_at_speed(SpeedSpec::Percent(30)).unwrap();

    assert_eq!(
        hub.commands(),
        vec![
            HubCommand::RunForDegrees {
                port: PortId::E,
                degrees: -90,
                speed: 50,
                stop: StopPolicy::Hold,
            },
            HubCommand::RunForTime {
                port: PortId::E,
                msec: 200,
                speed: -30,
                stop: StopPolicy::Float,
            },
            HubCommand::RunAtSpeed { port: PortId::E, speed: -30 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_blocking_run_waits_for_the_move() {
    let hub = hub_with(&[PortId::B]);
    let mut motor = connect(&hub, PortId::B, Polarity::Normal).await;
    let start = Instant::now();

    // 405 degrees at 810 deg/s
    let outcome = motor
        .run_for_degrees(405, SpeedSpec::DegreesPerSecond(810.0), StopPolicy::Brake)
        .await
        .unwrap();

    assert_eq!(outcome, CompletionState::Completed);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(motor.position(), 405);
    assert!(!motor.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_join_reports_every_outcome() {
    let hub = hub_with(&[PortId::E, PortId::F]);
    let mut left = connect(&hub, PortId::E, Polarity::Normal).await;
    let mut right = connect(&hub, PortId::F, Polarity::Normal).await;
    hub.script_outcome(EventSource::Port(PortId::E), MotorEvent::Stalled);
    let start = Instant::now();

    let l = left.start_for_degrees(360, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap();
    let r = right.start_for_degrees(720, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap();
    assert!(l.is_pending() && r.is_pending());

    let states = wait_all(&[l, r]).await;

    assert_eq!(states, vec![CompletionState::Stalled, CompletionState::Completed]);
    // 720 degrees at 405 deg/s, the stall on the left does not cut this short
    assert!(start.elapsed() >= Duration::from_millis(1770));
    assert!(left.is_stalled());
    assert_eq!(right.state(), CompletionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_second_command_while_pending_is_rejected() {
    let hub = hub_with(&[PortId::D]);
    let mut motor = connect(&hub, PortId::D, Polarity::Normal).await;

    let first = motor.start_for_degrees(360, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap();
    let err = motor
        .start_for_degrees(90, SpeedSpec::Percent(50), StopPolicy::Brake)
        .unwrap_err();

    assert_eq!(
        err,
        MotionError::CommandPending {
            handle: EventSource::Port(PortId::D)
        }
    );
    assert_eq!(hub.commands().len(), 1);
    assert_eq!(first.wait().await, CompletionState::Completed);

    // free again once the first move is done
    assert!(motor.start_for_degrees(90, SpeedSpec::Percent(50), StopPolicy::Brake).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_pending_move() {
    let hub = hub_with(&[PortId::A]);
    let mut motor = connect(&hub, PortId::A, Polarity::Normal).await;

    let done = motor.start_for_time(5000, SpeedSpec::Percent(40), StopPolicy::Brake).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(motor.is_running());

    motor.stop(StopPolicy::Float);

    assert_eq!(done.state(), CompletionState::Interrupted);
    assert!(motor.is_interrupted());
    assert!(!motor.is_running());
    assert_eq!(
        hub.commands().last(),
        Some(&HubCommand::Stop {
            port: PortId::A,
            policy: StopPolicy::Float,
        })
    );

    // the aborted move never reports back
    sleep(Duration::from_secs(6)).await;
    assert_eq!(done.state(), CompletionState::Interrupted);
}

#[tokio::test(start_paused = true)]
async fn test_run_to_position_directions() {
    let hub = hub_with(&[PortId::C]);
    let mut motor = connect(&hub, PortId::C, Polarity::Normal).await;
    motor.set_position(100).unwrap();

    motor
        .run_to_position(30, SpeedSpec::Percent(50), Direction::Clockwise, StopPolicy::Hold)
        .await
        .unwrap();
    // clockwise always turns forward by |100 - 30|
    assert_eq!(motor.position(), 170);

    motor
        .run_to_position(30, SpeedSpec::Percent(50), Direction::CounterClockwise, StopPolicy::Hold)
        .await
        .unwrap();
    assert_eq!(motor.position(), 30);

    motor
        .run_to_position(-45, SpeedSpec::Percent(50), Direction::Shortest, StopPolicy::Hold)
        .await
        .unwrap();
    assert_eq!(motor.position(), -45);

    assert_eq!(
        hub.commands(),
        vec![
            HubCommand::Preset { port: PortId::C, position: 100 },
            HubCommand::RunForDegrees {
                port: PortId::C,
                degrees: 70,
                speed: 50,
                stop: StopPolicy::Hold,
            },
            HubCommand::RunForDegrees {
                port: PortId::C,
                degrees: -140,
                speed: 50,
                stop: StopPolicy::Hold,
            },
            HubCommand::RunToPosition {
                port: PortId::C,
                position: -45,
                speed: 50,
                stop: StopPolicy::Hold,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_directional_position_needs_tracking_mode() {
    let hub = hub_with(&[PortId::C]);
    let mut motor = connect(&hub, PortId::C, Polarity::Normal).await;
    motor.set_mode(MotorMode::Speed).unwrap();
    hub.clear_commands();

    let err = motor
        .start_to_position(90, SpeedSpec::Percent(50), Direction::Clockwise, StopPolicy::Brake)
        .unwrap_err();
    assert_eq!(
        err,
        MotionError::PositionUntracked {
            port: PortId::C,
            mode: MotorMode::Speed
        }
    );
    assert!(hub.commands().is_empty());

    // the hub picks the path itself
    assert!(motor
        .start_to_position(90, SpeedSpec::Percent(50), Direction::Shortest, StopPolicy::Brake)
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_arguments_never_reach_the_hub() {
    let hub = hub_with(&[PortId::F]);
    let mut motor = connect(&hub, PortId::F, Polarity::Normal).await;

    let errors = vec![
        motor.start_for_degrees(90, SpeedSpec::Percent(101), StopPolicy::Brake).unwrap_err(),
        motor.start_for_degrees(-90, SpeedSpec::Percent(50), StopPolicy::Brake).unwrap_err(),
        motor
            .start_for_degrees(90, SpeedSpec::DegreesPerSecond(900.0), StopPolicy::Brake)
            .unwrap_err(),
        motor
            .start_for_time(100, SpeedSpec::RotationsPerSecond(f64::NAN), StopPolicy::Brake)
            .unwrap_err(),
        motor.run_at_speed(SpeedSpec::Percent(-150)).unwrap_err(),
    ];

    assert!(errors.iter().all(MotionError::is_invalid_argument), "{:?}", errors);
    assert!(hub.commands().is_empty());
    assert_eq!(motor.state(), CompletionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_directional_target_beyond_encoder_range() {
    let hub = hub_with(&[PortId::C]);
    let mut motor = connect(&hub, PortId::C, Polarity::Normal).await;
    motor.set_position(1).unwrap();
    hub.clear_commands();

    // |1 - i32::MIN| does not fit a hub degree count
    let err = motor
        .start_to_position(i32::MIN, SpeedSpec::Percent(50), Direction::Clockwise, StopPolicy::Brake)
        .unwrap_err();
    assert!(matches!(err, MotionError::DegreesOutOfRange(_)), "{:?}", err);
    assert!(err.is_invalid_argument());
    assert!(hub.commands().is_empty());
    assert_eq!(motor.state(), CompletionState::Idle);

    // from zero the same target is exactly i32::MAX + 1 away
    motor.set_position(0).unwrap();
    hub.clear_commands();
    assert!(motor
        .start_to_position(i32::MIN, SpeedSpec::Percent(50), Direction::CounterClockwise, StopPolicy::Brake)
        .unwrap_err()
        .is_invalid_argument());
    assert!(hub.commands().is_empty());
}
