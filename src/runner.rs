//! Runner: drive an observer on a fixed interval and feed a handoff queue.
//!
//! ```text
//! Idle ──run()──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!                    │                               ▲
//!                    └──── count reached / error ────┘
//! ```
//!
//! The loop is cooperative: a stop request is noticed at the top of the
//! next iteration, so it takes effect within one interval plus one sample.
//! Whatever ends the loop, the end-of-stream marker is queued exactly once.

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ObserverError, Result};
use crate::observer::Observer;
use crate::queue::{Producer, QueueDepth};

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Stopped => 3,
        }
    }
}

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Pause between samples. Must be non-zero.
    pub interval: Duration,

    /// Samples to take before stopping on its own; `0` runs until stopped.
    pub count: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            count: 0,
        }
    }
}

/// A snapshot of a runner, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub state: RunState,
    pub interval: SignedDuration,
    pub queue_size: usize,
    /// Zero until the runner has started.
    pub uptime: SignedDuration,
    pub started_at: Option<Timestamp>,
}

/// How a run ended when it ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Datapoints delivered to the queue.
    pub samples: u64,
}

/// State visible from other threads while the loop runs.
#[derive(Debug)]
struct Shared {
    name: String,
    interval: Duration,
    /// `None` when the runner was built without a queue.
    depth: Option<QueueDepth>,
    stop_requested: AtomicBool,
    state: AtomicU8,
    started_at: OnceLock<Timestamp>,
}

impl Shared {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn stop(&self) -> Result<()> {
        if self.depth.is_none() {
            return Err(ObserverError::QueueNotAttached);
        }
        self.stop_requested.store(true, Ordering::Release);
        if self.transition(RunState::Running, RunState::Stopping) {
            debug!(observer = %self.name, "stop requested");
        }
        Ok(())
    }

    fn status(&self) -> Result<Status> {
        let depth = self.depth.as_ref().ok_or(ObserverError::QueueNotAttached)?;
        let started_at = self.started_at.get().copied();
        let uptime =
            started_at.map_or(SignedDuration::ZERO, |start| Timestamp::now().duration_since(start));

        Ok(Status {
            state: self.state(),
            interval: SignedDuration::try_from(self.interval).unwrap_or(SignedDuration::MAX),
            queue_size: depth.get(),
            uptime,
            started_at,
        })
    }
}

/// Thread-safe control over a runner executing elsewhere.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    shared: Arc<Shared>,
}

impl RunnerHandle {
    /// Ask the loop to finish after its current iteration.
    pub fn stop(&self) -> Result<()> {
        self.shared.stop()
    }

    pub fn status(&self) -> Result<Status> {
        self.shared.status()
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }
}

/// Samples an [`Observer`] at a fixed interval into a handoff queue.
///
/// A runner runs once. The observer, and any source it holds, is dropped
/// with the runner.
#[derive(Debug)]
pub struct Runner {
    observer: Observer,
    count: u64,
    /// Taken by `run()` and dropped when it returns; handles never hold it.
    queue: Option<Producer>,
    shared: Arc<Shared>,
}

impl Runner {
    /// A runner with no queue attached; only useful for inspection until one is.
    pub fn new(observer: Observer, settings: RunSettings, queue: Option<Producer>) -> Result<Self> {
        if settings.interval.is_zero() {
            return Err(ObserverError::Configuration(
                "runner interval must be greater than zero".to_string(),
            ));
        }

        let shared = Shared {
            name: observer.name().to_string(),
            interval: settings.interval,
            depth: queue.as_ref().map(Producer::depth),
            stop_requested: AtomicBool::new(false),
            state: AtomicU8::new(RunState::Idle.as_u8()),
            started_at: OnceLock::new(),
        };

        Ok(Self {
            observer,
            count: settings.count,
            queue,
            shared: Arc::new(shared),
        })
    }

    pub fn with_queue(observer: Observer, settings: RunSettings, queue: Producer) -> Result<Self> {
        Self::new(observer, settings, Some(queue))
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn stop(&self) -> Result<()> {
        self.shared.stop()
    }

    pub fn status(&self) -> Result<Status> {
        self.shared.status()
    }

    /// Run the loop on a dedicated, named thread.
    pub fn spawn(mut self) -> Result<(RunnerHandle, JoinHandle<Result<RunReport>>)> {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name(format!("runner-{}", self.observer.name()))
            .spawn(move || self.run())?;
        Ok((handle, join))
    }

    /// Sample until the count is reached, `stop()` is called, or a sample fails.
    ///
    /// Blocks the calling thread. A sampling or queue error ends the run
    /// and is returned after the end marker has been queued.
    pub fn run(&mut self) -> Result<RunReport> {
        if self.shared.depth.is_none() {
            return Err(ObserverError::QueueNotAttached);
        }
        let queue = match self.queue.take() {
            Some(queue) if self.shared.transition(RunState::Idle, RunState::Running) => queue,
            _ => {
                return Err(ObserverError::Configuration(format!(
                    "runner for {} has already run",
                    self.observer.name()
                )));
            }
        };
        let _ = self.shared.started_at.set(Timestamp::now());

        info!(
            observer = %self.observer.name(),
            source = self.observer.source_kind(),
            interval_ms = self.shared.interval.as_millis(),
            count = self.count,
            "runner started"
        );

        let mut samples = 0_u64;
        let outcome = self.sample_loop(&queue, &mut samples);

        // Exactly one end marker, whatever stopped the loop.
        let ended = queue.end();
        // Consumers that missed the end marker see the stream end here.
        drop(queue);
        self.shared.set_state(RunState::Stopped);

        match &outcome {
            Ok(()) => info!(observer = %self.observer.name(), samples, "runner stopped"),
            Err(e) => warn!(observer = %self.observer.name(), samples, error = %e, "runner failed"),
        }

        outcome?;
        ended?;
        Ok(RunReport { samples })
    }

    fn sample_loop(&mut self, queue: &Producer, samples: &mut u64) -> Result<()> {
        let bounded = self.count > 0;
        let mut remaining = self.count;

        loop {
            if self.shared.stop_requested.load(Ordering::Acquire) {
                self.shared.transition(RunState::Running, RunState::Stopping);
                return Ok(());
            }

            let item = self.observer.sample()?;
            queue.put(item)?;
            *samples += 1;
            debug!(observer = %self.observer.name(), samples = *samples, "datapoint queued");

            if bounded {
                remaining -= 1;
                if remaining == 0 {
                    return Ok(());
                }
            }

            thread::sleep(self.shared.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, time::Instant};

    use tempfile::TempDir;

    use crate::encode::Encoded;
    use crate::model::{DataFormat, FieldValue, Fields};
    use crate::observer::ObserverOptions;
    use crate::queue::{Consumer, Poll, handoff};
    use crate::source::{BLOCK_STAT_FIELDS, MountTable, RandomSource, Source, StorageSource};

    const FAST: Duration = Duration::from_millis(20);

    /// Succeeds a fixed number of times, then reports the source gone.
    struct FlakySource {
        reads_left: u32,
    }

    impl Source for FlakySource {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        fn field_names(&self) -> &[&'static str] {
            &["n"]
        }

        fn read(&mut self) -> Result<Fields> {
            if self.reads_left == 0 {
                return Err(ObserverError::SourceUnavailable("process 42 not found".into()));
            }
            self.reads_left -= 1;
            Ok([("n", i64::from(self.reads_left))].into_iter().collect())
        }
    }

    fn test_runner(count: u64, capacity: usize) -> (Runner, Consumer) {
        let observer = Observer::new("looper", RandomSource::new()).unwrap();
        let (tx, rx) = handoff(capacity);
        let settings = RunSettings {
            interval: FAST,
            count,
        };
        (Runner::with_queue(observer, settings, tx).unwrap(), rx)
    }

    /// Everything up to and including the end marker, plus anything after it.
    fn collect_all(rx: &mut Consumer) -> (Vec<Encoded>, bool, Poll) {
        let items: Vec<Encoded> = rx.by_ref().collect();
        let ended = rx.is_ended();
        (items, ended, rx.try_recv())
    }

    #[test]
    fn count_limited_run_emits_exactly_n_then_end() {
        let (runner, mut rx) = test_runner(3, 16);
        let (_handle, join) = runner.spawn().unwrap();

        let report = join.join().unwrap().unwrap();
        let (items, ended, after) = collect_all(&mut rx);

        assert_eq!(report.samples, 3);
        assert_eq!(items.len(), 3);
        assert!(ended);
        assert_eq!(after, Poll::Ended);
        assert!(items.iter().all(|i| i.as_datapoint().unwrap().name() == "looper"));
    }

    #[test]
    fn every_consumer_sees_the_end_once_stopped() {
        let (runner, mut first) = test_runner(1, 4);
        let mut second = first.clone();
        let (handle, join) = runner.spawn().unwrap();
        join.join().unwrap().unwrap();

        let (items, ended, _) = collect_all(&mut first);
        assert_eq!(items.len(), 1);
        assert!(ended);

        // The handle outlives the run but does not keep the queue open.
        assert_eq!(handle.state(), RunState::Stopped);
        assert_eq!(second.recv_timeout(Duration::from_millis(500)), Poll::Ended);
        assert_eq!(second.recv(), None);
        assert_eq!(handle.status().unwrap().queue_size, 0);
    }

    #[test]
    fn integer_timestamps_are_an_interval_apart() {
        let observer = Observer::new("ticks", RandomSource::new()).unwrap();
        let (tx, mut rx) = handoff(4);
        let settings = RunSettings {
            interval: Duration::from_secs(1),
            count: 2,
        };
        Runner::with_queue(observer, settings, tx)
            .unwrap()
            .run()
            .unwrap();

        let stamps: Vec<i64> = rx
            .by_ref()
            .map(|i| i.as_datapoint().unwrap().timestamp().as_integer().unwrap())
            .collect();
        assert_eq!(stamps.len(), 2);
        assert!((1..=2).contains(&(stamps[1] - stamps[0])), "{stamps:?}");
    }

    #[test]
    fn storage_runner_delivers_block_stats_then_end() {
        let dir = TempDir::new().unwrap();
        let stat = dir.path().join("sys/block/sdb/stat");
        fs::create_dir_all(stat.parent().unwrap()).unwrap();
        fs::write(
            &stat,
            "  157698  27556 6712514 120460 364024 418340 15476480 2301124  0 481356 2421640\n",
        )
        .unwrap();
        let var = dir.path().join("var");
        fs::create_dir_all(&var).unwrap();
        let var = fs::canonicalize(var).unwrap();
        let table = MountTable::parse(&format!(
            "/dev/root on / type ext4 (rw)\n/dev/sdb on {} type xfs (rw)\n",
            var.display()
        ));

        let source = StorageSource::with_mount_table(&var, &table, dir.path().join("sys")).unwrap();
        let observer = Observer::new("var partition", source).unwrap();
        let (tx, mut rx) = handoff(8);
        let settings = RunSettings {
            interval: FAST,
            count: 2,
        };
        Runner::with_queue(observer, settings, tx)
            .unwrap()
            .run()
            .unwrap();

        let (items, ended, after) = collect_all(&mut rx);
        assert_eq!(items.len(), 2);
        assert!(ended);
        assert_eq!(after, Poll::Ended);
        for item in &items {
            let dp = item.as_datapoint().unwrap();
            assert_eq!(dp.name(), "var partition");
            assert_eq!(dp.fields().names().collect::<Vec<_>>(), BLOCK_STAT_FIELDS);
            assert!(
                dp.fields()
                    .iter()
                    .all(|(_, v)| matches!(v, FieldValue::Integer(_)))
            );
        }
    }

    #[test]
    fn status_serializes_with_snake_case_fields() {
        let (runner, _rx) = test_runner(1, 4);
        let json = serde_json::to_value(runner.status().unwrap()).unwrap();

        assert_eq!(json["state"], "idle");
        assert_eq!(json["queue_size"], 0);
        assert!(json.get("uptime").is_some());
    }

    #[test]
    fn timestamps_never_decrease() {
        let (runner, mut rx) = test_runner(5, 16);
        let (_handle, join) = runner.spawn().unwrap();
        join.join().unwrap().unwrap();

        let stamps: Vec<i64> = rx
            .by_ref()
            .map(|i| i.as_datapoint().unwrap().timestamp().as_integer().unwrap())
            .collect();
        assert_eq!(stamps.len(), 5);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unbounded_run_stops_on_request() {
        let (runner, mut rx) = test_runner(0, 1024);
        let (handle, join) = runner.spawn().unwrap();

        let delay = Duration::from_millis(200);
        thread::sleep(delay);
        handle.stop().unwrap();
        let report = join.join().unwrap().unwrap();

        let (items, ended, after) = collect_all(&mut rx);
        assert!(ended);
        assert_eq!(after, Poll::Ended);
        assert_eq!(items.len() as u64, report.samples);

        // Roughly delay / interval, with generous slack for a loaded machine.
        let expected = (delay.as_millis() / FAST.as_millis()) as usize;
        assert!(items.len() >= 2, "too few samples: {}", items.len());
        assert!(items.len() <= expected + 2, "too many samples: {}", items.len());
        assert_eq!(handle.state(), RunState::Stopped);
    }

    #[test]
    fn stop_latency_is_about_one_interval() {
        let observer = Observer::new("slow", RandomSource::new()).unwrap();
        let (tx, mut rx) = handoff(16);
        let settings = RunSettings {
            interval: Duration::from_millis(100),
            count: 0,
        };
        let runner = Runner::with_queue(observer, settings, tx).unwrap();
        let (handle, join) = runner.spawn().unwrap();

        assert!(rx.recv().is_some());
        let asked = Instant::now();
        handle.stop().unwrap();
        join.join().unwrap().unwrap();

        assert!(asked.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn source_failure_ends_run_after_end_marker() {
        let observer = Observer::new("flaky", FlakySource { reads_left: 2 }).unwrap();
        let (tx, mut rx) = handoff(16);
        let settings = RunSettings {
            interval: FAST,
            count: 0,
        };
        let mut runner = Runner::with_queue(observer, settings, tx).unwrap();

        let err = runner.run().unwrap_err();
        assert!(matches!(err, ObserverError::SourceUnavailable(_)));
        assert_eq!(runner.state(), RunState::Stopped);

        let (items, ended, _) = collect_all(&mut rx);
        assert_eq!(items.len(), 2);
        assert!(ended);
    }

    #[test]
    fn stop_before_run_queues_only_the_end_marker() {
        let (mut runner, mut rx) = test_runner(0, 4);
        runner.stop().unwrap();

        let report = runner.run().unwrap();
        assert_eq!(report.samples, 0);

        let (items, ended, _) = collect_all(&mut rx);
        assert!(items.is_empty());
        assert!(ended);
    }

    #[test]
    fn runner_runs_once() {
        let (mut runner, _rx) = test_runner(1, 4);
        runner.run().unwrap();

        let err = runner.run().unwrap_err();
        assert!(matches!(err, ObserverError::Configuration(_)));
    }

    #[test]
    fn no_queue_means_no_status_stop_or_run() {
        let observer = Observer::new("alone", RandomSource::new()).unwrap();
        let mut runner = Runner::new(observer, RunSettings::default(), None).unwrap();

        assert!(matches!(runner.status(), Err(ObserverError::QueueNotAttached)));
        assert!(matches!(runner.stop(), Err(ObserverError::QueueNotAttached)));
        assert!(matches!(runner.run(), Err(ObserverError::QueueNotAttached)));
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let observer = Observer::new("busy", RandomSource::new()).unwrap();
        let settings = RunSettings {
            interval: Duration::ZERO,
            count: 1,
        };

        assert!(matches!(
            Runner::new(observer, settings, None),
            Err(ObserverError::Configuration(_))
        ));
    }

    #[test]
    fn status_reports_interval_queue_and_uptime() {
        let (runner, mut rx) = test_runner(0, 64);
        let idle = runner.status().unwrap();
        assert_eq!(idle.state, RunState::Idle);
        assert_eq!(idle.uptime, SignedDuration::ZERO);
        assert_eq!(idle.interval, SignedDuration::from_millis(20));

        let (handle, join) = runner.spawn().unwrap();
        thread::sleep(Duration::from_millis(100));

        let running = handle.status().unwrap();
        assert_eq!(running.state, RunState::Running);
        assert!(running.queue_size >= 1);
        assert!(running.started_at.is_some());

        handle.stop().unwrap();
        join.join().unwrap().unwrap();
        rx.drain();
    }

    #[test]
    fn backpressure_blocks_instead_of_dropping() {
        let (runner, mut rx) = test_runner(6, 1);
        let (handle, join) = runner.spawn().unwrap();

        // The runner can get at most one datapoint ahead of us.
        thread::sleep(Duration::from_millis(100));
        assert!(handle.status().unwrap().queue_size <= 1);

        let items: Vec<Encoded> = rx.by_ref().collect();
        join.join().unwrap().unwrap();
        assert_eq!(items.len(), 6);
    }

    #[test]
    fn csv_runner_emits_lines() {
        let observer = Observer::with_options(
            "csv",
            RandomSource::new(),
            ObserverOptions {
                data_format: DataFormat::Csv,
                ..ObserverOptions::default()
            },
        )
        .unwrap();
        let (tx, mut rx) = handoff(8);
        let settings = RunSettings {
            interval: FAST,
            count: 2,
        };
        Runner::with_queue(observer, settings, tx)
            .unwrap()
            .run()
            .unwrap();

        let lines: Vec<String> = rx.by_ref().map(|i| i.as_text().unwrap().to_string()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.split(',').count() == 3));
    }
}
