//! Trigger computation for the three schedule policies

use chrono::{Local, TimeZone, Timelike};
use db_backup::managers::scheduler::{Begin, SchedulePolicy, TimerOptions};
use db_backup::utils::cron::CronSchedule;

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, min, 0).earliest().unwrap()
}

fn policy(once: bool, cron: Option<&str>, begin: &str, frequency: u32) -> SchedulePolicy {
    SchedulePolicy::from_options(&TimerOptions {
        once,
        cron: cron.map(String::from),
        begin: begin.to_string(),
        frequency,
    })
    .unwrap()
}

#[test]
fn test_once_has_no_trigger() {
    let p = policy(true, Some("0 * * * *"), "+0", 60);
    assert_eq!(p.first_trigger(local(2024, 1, 10, 12, 0)).unwrap(), None);
    assert_eq!(
        p.next_trigger(local(2024, 1, 10, 12, 0), local(2024, 1, 10, 12, 5))
            .unwrap(),
        None
    );
}

#[test]
fn test_relative_begin_then_frequency() {
    let p = policy(false, None, "+15", 60);
    let start = local(2024, 1, 10, 12, 0);
    let first = p.first_trigger(start).unwrap().unwrap();
    assert_eq!(first, local(2024, 1, 10, 12, 15));

    let second = p.next_trigger(first, first).unwrap().unwrap();
    assert_eq!(second, local(2024, 1, 10, 13, 15));
}

#[test]
fn test_absolute_begin_rolls_to_tomorrow() {
    let begin = Begin::parse("0230").unwrap();
    let first = begin.first_trigger(local(2024, 1, 10, 12, 0));
    assert_eq!(first, local(2024, 1, 11, 2, 30));

    let first = begin.first_trigger(local(2024, 1, 10, 1, 0));
    assert_eq!(first, local(2024, 1, 10, 2, 30));
}

#[test]
fn test_interval_skips_triggers_missed_by_a_long_cycle() {
    let p = policy(false, None, "+0", 60);
    let previous = local(2024, 1, 10, 12, 0);
    // Cycle ran for 150 minutes: 13:00 and 14:00 were missed
    let next = p
        .next_trigger(previous, local(2024, 1, 10, 14, 30))
        .unwrap()
        .unwrap();
    assert_eq!(next, local(2024, 1, 10, 15, 0));
}

#[test]
fn test_cron_next_trigger_after_long_cycle() {
    let p = policy(false, Some("*/10 * * * *"), "+0", 60);
    let previous = local(2024, 1, 10, 12, 0);
    let next = p
        .next_trigger(previous, local(2024, 1, 10, 12, 25))
        .unwrap()
        .unwrap();
    assert_eq!(next, local(2024, 1, 10, 12, 30));
}

#[test]
fn test_cron_weekday_and_names() {
    let cron = CronSchedule::parse("0 3 * * MON-FRI").unwrap();
    // 2024-01-13 is a Saturday
    let next = cron.next_after(local(2024, 1, 13, 4, 0)).unwrap();
    assert_eq!(next, local(2024, 1, 15, 3, 0));
    assert_eq!(next.minute(), 0);
}

#[test]
fn test_bad_inputs_are_config_errors() {
    let bad = |options: TimerOptions| SchedulePolicy::from_options(&options).unwrap_err();
    assert!(bad(TimerOptions {
        cron: Some("61 * * * *".to_string()),
        ..Default::default()
    })
    .is_config());
    assert!(bad(TimerOptions {
        begin: "2400".to_string(),
        ..Default::default()
    })
    .is_config());
    assert!(bad(TimerOptions {
        frequency: 0,
        ..Default::default()
    })
    .is_config());
}
