//! Scheduler loop under paused tokio time

use chrono::{Local, TimeZone};
use db_backup::error::BackupError;
use db_backup::managers::scheduler::{Clock, SchedulePolicy, Scheduler, TimerOptions, TokioClock};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const MINUTE: u64 = 60;

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * MINUTE)
}

fn interval(begin: &str, frequency: u32) -> SchedulePolicy {
    SchedulePolicy::from_options(&TimerOptions {
        begin: begin.to_string(),
        frequency,
        ..Default::default()
    })
    .unwrap()
}

fn scheduler(policy: SchedulePolicy) -> Scheduler {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(Local::now()));
    Scheduler::with_clock(policy, clock)
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_triggers_are_skipped() {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let origin = Instant::now();

    // Every hour, but each cycle takes 90 minutes
    scheduler(interval("+0", 60))
        .run_with_shutdown(
            || {
                let starts = starts.clone();
                async move {
                    starts.lock().push(origin.elapsed().as_secs() / MINUTE);
                    sleep(minutes(90)).await;
                    Ok(())
                }
            },
            sleep(minutes(250)),
        )
        .await
        .unwrap();

    assert_eq!(*starts.lock(), vec![0, 120, 240]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycles_do_not_stop_the_loop() {
    let calls = Arc::new(Mutex::new(0u32));

    scheduler(interval("+5", 10))
        .run_with_shutdown(
            || {
                let calls = calls.clone();
                async move {
                    *calls.lock() += 1;
                    Err(BackupError::database("dump", "server went away"))
                }
            },
            sleep(minutes(40)),
        )
        .await
        .unwrap();

    // Triggers at 5, 15, 25 and 35 minutes
    assert_eq!(*calls.lock(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_once_runs_immediately_and_returns_cycle_error() {
    let origin = Instant::now();
    let ran_at = Arc::new(Mutex::new(None));

    let result = scheduler(SchedulePolicy::Once)
        .run({
            let ran_at = ran_at.clone();
            move || {
                let ran_at = ran_at.clone();
                async move {
                    *ran_at.lock() = Some(origin.elapsed());
                    Err(BackupError::config("boom"))
                }
            }
        })
        .await;

    assert!(result.unwrap_err().is_config());
    assert_eq!(*ran_at.lock(), Some(Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn test_cron_follows_wall_clock() {
    let base = Local
        .with_ymd_and_hms(2024, 1, 10, 12, 7, 0)
        .earliest()
        .unwrap();
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(base));
    let policy = SchedulePolicy::from_options(&TimerOptions {
        cron: Some("*/15 * * * *".to_string()),
        ..Default::default()
    })
    .unwrap();

    let fired = Arc::new(Mutex::new(Vec::new()));
    let recorder = clock.clone();
    Scheduler::with_clock(policy, clock)
        .run_with_shutdown(
            || {
                let fired = fired.clone();
                let now = recorder.now();
                async move {
                    fired.lock().push(now.format("%H:%M").to_string());
                    Ok(())
                }
            },
            sleep(minutes(40)),
        )
        .await
        .unwrap();

    assert_eq!(*fired.lock(), vec!["12:15", "12:30", "12:45"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_trigger() {
    let calls = Arc::new(Mutex::new(0u32));

    scheduler(interval("+30", 60))
        .run_with_shutdown(
            || {
                let calls = calls.clone();
                async move {
                    *calls.lock() += 1;
                    Ok(())
                }
            },
            sleep(minutes(10)),
        )
        .await
        .unwrap();

    assert_eq!(*calls.lock(), 0);
}
