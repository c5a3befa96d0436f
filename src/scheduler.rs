// src/scheduler.rs
//! Job scheduler.
//!
//! Each registered job gets its own task, so a job never overlaps itself while
//! different jobs run concurrently. Two trigger kinds:
//! - `Interval`: next start = last start + interval. Overruns push the next run
//!   back (an overdue job fires immediately); the first run is at startup.
//! - `Calendar`: next UTC wall-clock time matching {hours, minute, weekdays},
//!   computed from the clock, never from how long the job took.
//!
//! A failing or panicking run is logged and counted; the job stays registered.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::analyze::{PriceCell, PriceObservation};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("job_runs_total", "Job invocations started.");
        describe_counter!("job_failures_total", "Job invocations that returned an error or panicked.");
        describe_histogram!("job_duration_ms", "Job invocation wall time in milliseconds.");
    });
}

/// Wall-clock pattern. Empty `hours` means every hour, empty `weekdays` every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSpec {
    hours: Vec<u32>,
    minute: u32,
    weekdays: Vec<Weekday>,
}

impl CalendarSpec {
    pub fn new(hours: Vec<u32>, minute: u32, weekdays: Vec<Weekday>) -> Result<Self> {
        if minute > 59 {
            bail!("calendar minute out of range: {minute}");
        }
        if let Some(h) = hours.iter().find(|h| **h > 23) {
            bail!("calendar hour out of range: {h}");
        }
        let mut hours = hours;
        hours.sort_unstable();
        hours.dedup();
        Ok(Self {
            hours,
            minute,
            weekdays,
        })
    }

    pub fn daily(hour: u32, minute: u32) -> Result<Self> {
        Self::new(vec![hour], minute, Vec::new())
    }

    fn day_allowed(&self, wd: Weekday) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&wd)
    }

    /// First matching instant strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let all_hours: Vec<u32> = (0..24).collect();
        let hours = if self.hours.is_empty() {
            &all_hours
        } else {
            &self.hours
        };
        // a full week always contains a match
        for offset in 0..=7 {
            let day = t.date_naive() + ChronoDuration::days(offset);
            if !self.day_allowed(day.weekday()) {
                continue;
            }
            for &h in hours {
                let Some(time) = NaiveTime::from_hms_opt(h, self.minute, 0) else {
                    continue;
                };
                let candidate = day.and_time(time).and_utc();
                if candidate > t {
                    return candidate;
                }
            }
        }
        // unreachable once hours and minute are validated
        t + ChronoDuration::days(1)
    }
}

impl fmt::Display for CalendarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours.is_empty() {
            write!(f, "hourly at :{:02}", self.minute)?;
        } else {
            let hs: Vec<String> = self
                .hours
                .iter()
                .map(|h| format!("{h:02}:{:02}", self.minute))
                .collect();
            write!(f, "at {}", hs.join(","))?;
        }
        if !self.weekdays.is_empty() {
            let ds: Vec<String> = self.weekdays.iter().map(|d| d.to_string()).collect();
            write!(f, " on {}", ds.join(","))?;
        }
        f.write_str(" UTC")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Interval(Duration),
    Calendar(CalendarSpec),
}

impl Trigger {
    /// Earliest start that can follow a run started at `started`.
    fn following(&self, started: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval(every) => ChronoDuration::from_std(*every).ok().map(|d| started + d),
            Trigger::Calendar(cal) => Some(cal.next_after(started)),
        }
    }
}

/// Wall-clock source for calendar slots and run timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval(d) => write!(f, "every {}s", d.as_secs()),
            Trigger::Calendar(c) => c.fmt(f),
        }
    }
}

/// What a job invocation gets to see.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub price: PriceCell,
    pub started_at: DateTime<Utc>,
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, ctx: &JobContext) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub trigger: String,
    pub running: bool,
    pub last_start: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub runs: u64,
    pub failures: u64,
}

struct JobSlot {
    status: Mutex<JobStatus>,
}

impl JobSlot {
    fn lock(&self) -> MutexGuard<'_, JobStatus> {
        match self.status.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// Read-only view of a running scheduler, cheap to clone into handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    price: PriceCell,
    slots: Arc<Vec<Arc<JobSlot>>>,
}

impl SchedulerHandle {
    pub fn job_count(&self) -> usize {
        self.slots.len()
    }

    pub fn price(&self) -> Option<PriceObservation> {
        self.price.snapshot()
    }

    pub fn status(&self) -> Vec<JobStatus> {
        self.slots.iter().map(|s| s.lock().clone()).collect()
    }

    pub fn job(&self, name: &str) -> Option<JobStatus> {
        self.slots
            .iter()
            .map(|s| s.lock().clone())
            .find(|s| s.name == name)
    }
}

struct Registered {
    job: Arc<dyn Job>,
    trigger: Trigger,
}

/// Static registry; built once, then started.
pub struct Scheduler {
    price: PriceCell,
    clock: Clock,
    jobs: Vec<Registered>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            price: PriceCell::new(),
            clock: Arc::new(Utc::now),
            jobs: Vec::new(),
        }
    }

    /// Replace the system clock, e.g. with one that follows paused tokio time.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// The price state every job context carries.
    pub fn price_cell(&self) -> PriceCell {
        self.price.clone()
    }

    pub fn register(mut self, job: Arc<dyn Job>, trigger: Trigger) -> Self {
        self.jobs.push(Registered { job, trigger });
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn start(self) -> RunningScheduler {
        ensure_metrics_described();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        let mut slots = Vec::with_capacity(self.jobs.len());

        for Registered { job, trigger } in self.jobs {
            let slot = Arc::new(JobSlot {
                status: Mutex::new(JobStatus {
                    name: job.name().to_string(),
                    trigger: trigger.to_string(),
                    running: false,
                    last_start: None,
                    next_run: None,
                    runs: 0,
                    failures: 0,
                }),
            });
            slots.push(slot.clone());
            tasks.spawn(job_loop(
                job,
                trigger,
                self.price.clone(),
                self.clock.clone(),
                slot,
                shutdown_rx.clone(),
            ));
        }
        tracing::info!(jobs = slots.len(), "scheduler started");

        RunningScheduler {
            handle: SchedulerHandle {
                price: self.price,
                slots: Arc::new(slots),
            },
            shutdown_tx,
            tasks,
        }
    }
}

pub struct RunningScheduler {
    handle: SchedulerHandle,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl RunningScheduler {
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop issuing invocations, give in-flight ones `grace` to finish, then abort them.
    pub async fn shutdown(mut self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        let drained = tokio::time::timeout(grace, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(grace_secs = grace.as_secs(), "jobs still running after grace period, aborting");
            self.tasks.shutdown().await;
        }
        tracing::info!("scheduler stopped");
    }
}

/// Aborts the inner run when the owning loop is dropped (e.g. aborted on shutdown).
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn job_loop(
    job: Arc<dyn Job>,
    trigger: Trigger,
    price: PriceCell,
    clock: Clock,
    slot: Arc<JobSlot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = job.name().to_string();
    let mut last_start: Option<Instant> = None;
    // a slot fires at most once, even if the wall clock lags the timer on wake
    let mut last_slot: Option<DateTime<Utc>> = None;

    loop {
        let now = clock();
        let (wait, next_run) = match &trigger {
            Trigger::Interval(every) => {
                let wait = match last_start {
                    None => Duration::ZERO,
                    Some(s) => (s + *every).saturating_duration_since(Instant::now()),
                };
                (wait, ChronoDuration::from_std(wait).ok().map(|d| now + d))
            }
            Trigger::Calendar(cal) => {
                let slot_at = cal.next_after(last_slot.map_or(now, |s| s.max(now)));
                last_slot = Some(slot_at);
                ((slot_at - now).to_std().unwrap_or_default(), Some(slot_at))
            }
        };
        slot.lock().next_run = next_run;

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            break;
        }

        last_start = Some(Instant::now());
        let ctx = JobContext {
            price: price.clone(),
            started_at: clock(),
        };
        {
            let mut st = slot.lock();
            st.running = true;
            st.last_start = Some(ctx.started_at);
            let from = last_slot.map_or(ctx.started_at, |s| s.max(ctx.started_at));
            st.next_run = trigger.following(from);
            st.runs += 1;
        }
        counter!("job_runs_total", "job" => name.clone()).increment(1);
        tracing::debug!(job = %name, "job started");

        let t0 = Instant::now();
        let runner = job.clone();
        let mut inflight = AbortOnDrop(tokio::spawn(async move { runner.run(&ctx).await }));
        let outcome = (&mut inflight.0).await;
        histogram!("job_duration_ms", "job" => name.clone())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::error!(job = %name, error = ?e, "job failed");
                Some("error")
            }
            Err(e) if e.is_panic() => {
                tracing::error!(job = %name, "job panicked");
                Some("panic")
            }
            Err(_) => Some("cancelled"),
        };
        let mut st = slot.lock();
        st.running = false;
        if let Some(reason) = failure {
            st.failures += 1;
            counter!("job_failures_total", "job" => name.clone(), "reason" => reason).increment(1);
        }
    }
    slot.lock().next_run = None;
    tracing::debug!(job = %name, "job loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn calendar_daily_rolls_to_next_day() {
        let cal = CalendarSpec::daily(9, 0).unwrap();
        assert_eq!(cal.next_after(at(2025, 3, 4, 8, 59)), at(2025, 3, 4, 9, 0));
        // strictly after: the slot itself moves on
        assert_eq!(cal.next_after(at(2025, 3, 4, 9, 0)), at(2025, 3, 5, 9, 0));
    }

    #[test]
    fn calendar_hours_and_weekdays() {
        // 2025-03-04 is a Tuesday
        let cal = CalendarSpec::new(vec![20, 4, 12], 1, vec![Weekday::Mon]).unwrap();
        assert_eq!(cal.next_after(at(2025, 3, 4, 10, 0)), at(2025, 3, 10, 4, 1));

        let hourly = CalendarSpec::new(vec![], 30, vec![]).unwrap();
        assert_eq!(hourly.next_after(at(2025, 3, 4, 10, 45)), at(2025, 3, 4, 11, 30));
    }

    #[test]
    fn calendar_rejects_bad_fields() {
        assert!(CalendarSpec::new(vec![24], 0, vec![]).is_err());
        assert!(CalendarSpec::daily(0, 60).is_err());
    }

    #[test]
    fn trigger_display() {
        assert_eq!(Trigger::Interval(Duration::from_secs(300)).to_string(), "every 300s");
        let c = CalendarSpec::new(vec![0, 12], 5, vec![Weekday::Fri]).unwrap();
        assert_eq!(Trigger::Calendar(c).to_string(), "at 00:05,12:05 on Fri UTC");
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        async fn run(&self, _ctx: &JobContext) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interval_job_runs_at_start_and_every_period() {
        let hits = Arc::new(AtomicUsize::new(0));
        let running = Scheduler::new()
            .register(
                Arc::new(Counting(hits.clone())),
                Trigger::Interval(Duration::from_secs(60)),
            )
            .start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let st = running.handle().job("counting").unwrap();
        assert_eq!(st.runs, 3);
        assert!(st.next_run.is_some());
        running.shutdown(Duration::from_secs(1)).await;
    }
}
