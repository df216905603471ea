//! Deciding when backup cycles run
//!
//! Exactly one policy is active per process: `once`, a cron expression, or a
//! begin time followed by a fixed frequency. Cycles are awaited inline, so a
//! slow cycle can never overlap the next; triggers that pass while a cycle is
//! running are dropped.

use crate::error::{BackupError, Result};
use crate::utils::cron::CronSchedule;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_BEGIN: &str = "+0";
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 1440;

/// Source of wall-clock time for trigger computation
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Wall clock that advances with tokio's timer, so it follows paused time in tests
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: DateTime<Local>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Local>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = tokio::time::Instant::now().duration_since(self.start);
        self.base + ChronoDuration::from_std(elapsed).unwrap_or_else(|_| ChronoDuration::zero())
    }
}

/// Start of an interval schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// `HHMM`: the next occurrence of this local time of day
    Absolute { hour: u32, minute: u32 },
    /// `+MM`: minutes after the scheduler starts
    Relative(u32),
}

impl Begin {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || {
            BackupError::config(format!(
                "invalid begin '{}': expected HHMM or +MM",
                raw
            ))
        };

        if let Some(minutes) = raw.strip_prefix('+') {
            if minutes.is_empty() || !minutes.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            return minutes.parse().map(Begin::Relative).map_err(|_| invalid());
        }

        if raw.len() != 4 || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u32 = raw[..2].parse().map_err(|_| invalid())?;
        let minute: u32 = raw[2..].parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Begin::Absolute { hour, minute })
    }

    /// First trigger for a scheduler started at `now`
    pub fn first_trigger(&self, now: DateTime<Local>) -> DateTime<Local> {
        match *self {
            Begin::Relative(minutes) => now + ChronoDuration::minutes(minutes as i64),
            Begin::Absolute { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
                let mut date = now.date_naive();
                loop {
                    if let Some(candidate) = Local.from_local_datetime(&date.and_time(time)).earliest() {
                        if candidate > now {
                            return candidate;
                        }
                    }
                    date += ChronoDuration::days(1);
                }
            }
        }
    }
}

impl fmt::Display for Begin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Begin::Absolute { hour, minute } => write!(f, "{:02}{:02}", hour, minute),
            Begin::Relative(minutes) => write!(f, "+{}", minutes),
        }
    }
}

/// Raw timer settings as configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOptions {
    pub once: bool,
    pub cron: Option<String>,
    pub begin: String,
    pub frequency: u32,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            once: false,
            cron: None,
            begin: DEFAULT_BEGIN.to_string(),
            frequency: DEFAULT_FREQUENCY_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulePolicy {
    Once,
    Cron(CronSchedule),
    Interval { begin: Begin, frequency: u32 },
}

impl SchedulePolicy {
    /// Resolve the active policy: `once`, then cron, then begin/frequency
    pub fn from_options(options: &TimerOptions) -> Result<Self> {
        if options.once {
            return Ok(SchedulePolicy::Once);
        }

        if let Some(expr) = options.cron.as_deref().filter(|c| !c.trim().is_empty()) {
            let cron = CronSchedule::parse(expr).map_err(|e| BackupError::config(e.to_string()))?;
            return Ok(SchedulePolicy::Cron(cron));
        }

        if options.frequency == 0 {
            return Err(BackupError::config("frequency must be greater than zero"));
        }
        Ok(SchedulePolicy::Interval {
            begin: Begin::parse(&options.begin)?,
            frequency: options.frequency,
        })
    }

    /// First trigger after start; `None` for `Once`, which runs immediately
    pub fn first_trigger(&self, now: DateTime<Local>) -> Result<Option<DateTime<Local>>> {
        match self {
            SchedulePolicy::Once => Ok(None),
            SchedulePolicy::Cron(cron) => cron.next_after(now).map(Some).ok_or_else(|| {
                BackupError::Scheduler(format!("cron '{}' never fires", cron))
            }),
            SchedulePolicy::Interval { begin, .. } => Ok(Some(begin.first_trigger(now))),
        }
    }

    /// Trigger following `previous`, given the cycle finished at `now`.
    ///
    /// Triggers at or before `now` elapsed while the cycle ran and are skipped.
    pub fn next_trigger(
        &self,
        previous: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<Option<DateTime<Local>>> {
        match self {
            SchedulePolicy::Once => Ok(None),
            SchedulePolicy::Cron(cron) => {
                let never = || BackupError::Scheduler(format!("cron '{}' never fires again", cron));
                let next = cron.next_after(previous).ok_or_else(never)?;
                if next > now {
                    return Ok(Some(next));
                }
                warn!("Skipping cron trigger(s) from {} that elapsed during the previous run", next);
                cron.next_after(now).map(Some).ok_or_else(never)
            }
            SchedulePolicy::Interval { frequency, .. } => {
                let step = ChronoDuration::minutes(*frequency as i64);
                let mut next = previous + step;
                let mut skipped = 0u64;
                while next <= now {
                    next += step;
                    skipped += 1;
                }
                if skipped > 0 {
                    warn!(
                        "Skipped {} trigger(s) that elapsed during the previous run",
                        skipped
                    );
                }
                Ok(Some(next))
            }
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::Once => f.write_str("once"),
            SchedulePolicy::Cron(cron) => write!(f, "cron '{}'", cron),
            SchedulePolicy::Interval { begin, frequency } => {
                write!(f, "every {} minute(s) beginning {}", frequency, begin)
            }
        }
    }
}

pub struct Scheduler {
    policy: SchedulePolicy,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(policy: SchedulePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: SchedulePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// Run until the schedule is exhausted
    pub async fn run<F, Fut>(&self, cycle: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.run_with_shutdown(cycle, std::future::pending()).await
    }

    /// Run cycles until `shutdown` resolves. Shutdown is observed between cycles only.
    pub async fn run_with_shutdown<F, Fut, S>(&self, mut cycle: F, shutdown: S) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
        S: Future<Output = ()>,
    {
        let Some(mut next) = self.policy.first_trigger(self.clock.now())? else {
            info!("Running a single backup cycle");
            return cycle().await;
        };

        info!("Scheduler started: {}", self.policy);
        tokio::pin!(shutdown);

        loop {
            info!("Next backup at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));
            let wait = (next - self.clock.now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = cycle().await {
                error!("Backup cycle failed: {}", e);
            }

            match self.policy.next_trigger(next, self.clock.now())? {
                Some(trigger) => next = trigger,
                None => return Ok(()),
            }
        }
    }
}
