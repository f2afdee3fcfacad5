// Command-driven runtime loop

use std::thread;
use std::time::Duration;

use chrono::DateTime;
use oramon::core::monitor::{Connection, Monitor, MonitorCommand, MonitorRuntime, MonitorState};
use tempfile::TempDir;

use super::support::{demo_connection, monitor_in, settings};

#[test]
fn test_start_ticks_immediately_then_shuts_down() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let runtime = MonitorRuntime::new(monitor);
    let commands = runtime.sender();
    commands.send(MonitorCommand::Start).unwrap();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        commands.send(MonitorCommand::Shutdown).unwrap();
    });

    let monitor = runtime.run().unwrap();
    stopper.join().unwrap();

    // one scheduled tick; the next is 5s away
    assert_eq!(monitor.history().len(), 1);
    assert!(monitor.is_active());
}

fn tick_times_ms(monitor: &Monitor) -> Vec<i64> {
    monitor
        .history()
        .iter()
        .map(|t| {
            DateTime::parse_from_rfc3339(&t.sample_id)
                .unwrap()
                .timestamp_millis()
        })
        .collect()
}

#[test]
fn test_collect_now_adds_one_tick_while_active() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let runtime = MonitorRuntime::new(monitor);
    let commands = runtime.sender();
    commands.send(MonitorCommand::Start).unwrap();

    let driver = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        commands.send(MonitorCommand::CollectNow).unwrap();
        thread::sleep(Duration::from_millis(200));
        commands.send(MonitorCommand::Shutdown).unwrap();
    });

    let monitor = runtime.run().unwrap();
    driver.join().unwrap();

    // the scheduled tick plus the manual one; the next scheduled tick is
    // still 5s after the first
    assert_eq!(monitor.history().len(), 2);
    let times = tick_times_ms(&monitor);
    assert!(times[1] - times[0] >= 90, "gap {}", times[1] - times[0]);
    assert!(monitor.is_active());
}

#[test]
fn test_collect_now_keeps_the_schedule() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let runtime = MonitorRuntime::new(monitor);
    let commands = runtime.sender();
    commands.send(MonitorCommand::Start).unwrap();

    let driver = thread::spawn(move || {
        thread::sleep(Duration::from_millis(1000));
        commands.send(MonitorCommand::CollectNow).unwrap();
        thread::sleep(Duration::from_millis(4600));
        commands.send(MonitorCommand::Shutdown).unwrap();
    });

    let monitor = runtime.run().unwrap();
    driver.join().unwrap();

    // scheduled at 0s, manual at ~1s, scheduled at 5s (not 6s)
    let times = tick_times_ms(&monitor);
    assert_eq!(times.len(), 3, "ticks at {:?}", times);
    let manual = times[1] - times[0];
    assert!((900..2000).contains(&manual), "manual tick after {}ms", manual);
    let scheduled = times[2] - times[0];
    assert!(
        (4900..5400).contains(&scheduled),
        "second scheduled tick after {}ms",
        scheduled
    );
}

#[test]
fn test_commands_are_handled_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let mut monitor = monitor_in(temp_dir.path(), settings());
    monitor.attach(Box::new(demo_connection()));

    let runtime = MonitorRuntime::new(monitor);
    let commands = runtime.sender();
    commands.send(MonitorCommand::CollectNow).unwrap();
    commands
        .send(MonitorCommand::SetInterval(Duration::from_secs(30)))
        .unwrap();
    commands
        .send(MonitorCommand::SetInterval(Duration::from_secs(1)))
        .unwrap();
    commands.send(MonitorCommand::Shutdown).unwrap();

    let monitor = runtime.run().unwrap();
    assert_eq!(monitor.state(), MonitorState::Idle);
    assert_eq!(monitor.history().len(), 1);
    // out-of-range interval was ignored
    assert_eq!(monitor.interval(), Duration::from_secs(30));
}

#[test]
fn test_run_ends_when_senders_drop() {
    let temp_dir = TempDir::new().unwrap();
    let monitor = monitor_in(temp_dir.path(), settings());
    let runtime = MonitorRuntime::new(monitor);
    let commands = runtime.sender();
    drop(commands);

    let monitor = runtime.run().unwrap();
    assert!(monitor.history().is_empty());
}

#[test]
fn test_reconnect_uses_connector() {
    let temp_dir = TempDir::new().unwrap();
    let monitor = monitor_in(temp_dir.path(), settings());
    let runtime = MonitorRuntime::new(monitor).with_connector(Box::new(|| {
        Ok(Box::new(demo_connection()) as Box<dyn Connection>)
    }));
    let commands = runtime.sender();
    commands.send(MonitorCommand::Start).unwrap();
    commands.send(MonitorCommand::Reconnect).unwrap();
    commands.send(MonitorCommand::Stop).unwrap();
    commands.send(MonitorCommand::Shutdown).unwrap();

    let monitor = runtime.run().unwrap();
    assert!(monitor.is_connected());
    assert_eq!(monitor.state(), MonitorState::Idle);
}
