//! Observe command: run an observer and write what it produces.
//!
//! The runner samples on its own thread; this thread is the consumer,
//! draining the handoff queue into a recorder until the end marker.

use std::{io::Write, thread, time::Duration};

use tracing::debug;

use crate::config::Config;
use crate::observer::{FieldHeader, Observer};
use crate::queue::{Consumer, handoff};
use crate::recorder::TextRecorder;
use crate::runner::{RunReport, Runner, RunnerHandle};
use crate::source::{CpuSource, ProcessSource, RandomSource, Source, StorageSource};

use super::{ObserveArgs, ObserveSource};

pub(super) fn cmd_observe(
    target: &ObserveSource,
    args: &ObserveArgs,
    config: &Config,
) -> Result<(), String> {
    let duration = args.duration()?;
    let source = open_source(target)?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| target.default_name());

    let observer = Observer::from_boxed(name, source, config.observer_options())
        .map_err(|e| format!("failed to set up observer: {e}"))?;
    let header = match observer.field_header() {
        FieldHeader::Line(line) => Some(line),
        FieldHeader::Names(_) => None,
    };

    let (producer, consumer) = handoff(config.queue_capacity);
    let runner = Runner::with_queue(observer, config.run_settings(), producer)
        .map_err(|e| format!("failed to set up runner: {e}"))?;
    let (handle, join) = runner
        .spawn()
        .map_err(|e| format!("failed to start runner: {e}"))?;

    if let Some(limit) = duration {
        stop_after(handle.clone(), limit);
    }

    let recorded = match &args.out {
        Some(path) => TextRecorder::append_to(path)
            .map_err(|e| format!("failed to open {}: {e}", path.display()))
            .and_then(|recorder| record(recorder, consumer, header.as_deref())),
        None => record(TextRecorder::stdout(), consumer, header.as_deref()),
    };

    if recorded.is_err() {
        // Nobody is reading any more; let the runner wind down.
        if let Err(e) = handle.stop() {
            debug!(error = %e, "stop after write failure not delivered");
        }
    }

    let outcome = join
        .join()
        .map_err(|_| "runner thread panicked".to_string())?;
    let lines = recorded?;
    let RunReport { samples } =
        outcome.map_err(|e| format!("observing {} failed: {e}", target.description()))?;

    if let Some(path) = &args.out {
        eprintln!(
            "Observed {} ({samples} samples) → {}",
            target.description(),
            path.display()
        );
    }
    debug!(samples, lines, "observe finished");
    Ok(())
}

fn open_source(target: &ObserveSource) -> Result<Box<dyn Source>, String> {
    let source: Box<dyn Source> = match target {
        ObserveSource::Test => Box::new(RandomSource::new()),
        ObserveSource::Cpu => Box::new(CpuSource::new()),
        ObserveSource::Storage { path } => Box::new(
            StorageSource::new(path)
                .map_err(|e| format!("cannot observe storage for {}: {e}", path.display()))?,
        ),
        ObserveSource::Process { pid } => Box::new(ProcessSource::new(*pid)),
    };
    Ok(source)
}

/// Ask the runner to stop once `limit` has passed.
fn stop_after(handle: RunnerHandle, limit: Duration) {
    thread::spawn(move || {
        thread::sleep(limit);
        if let Err(e) = handle.stop() {
            debug!(error = %e, "timed stop not delivered");
        }
    });
}

/// Write the header, then every datapoint until the end marker.
///
/// Returns the number of lines written. The consumer is dropped on
/// return, so a runner still sampling after a write error sees the
/// queue close.
fn record<W: Write>(
    mut recorder: TextRecorder<W>,
    consumer: Consumer,
    header: Option<&str>,
) -> Result<u64, String> {
    if let Some(header) = header {
        recorder
            .store(header)
            .map_err(|e| format!("failed to write header: {e}"))?;
    }

    for item in consumer {
        recorder
            .store_encoded(&item)
            .map_err(|e| format!("failed to write datapoint: {e}"))?;
    }

    Ok(recorder.lines())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::DataFormat;
    use crate::observer::ObserverOptions;
    use crate::runner::RunSettings;

    #[test]
    fn record_writes_header_then_lines() {
        let observer = Observer::with_options(
            "test",
            RandomSource::new(),
            ObserverOptions {
                data_format: DataFormat::Csv,
                ..ObserverOptions::default()
            },
        )
        .unwrap();
        let FieldHeader::Line(header) = observer.field_header() else {
            panic!("csv observer should have a header line");
        };

        let (producer, consumer) = handoff(4);
        let settings = RunSettings {
            interval: Duration::from_millis(5),
            count: 3,
        };
        Runner::with_queue(observer, settings, producer)
            .unwrap()
            .run()
            .unwrap();

        let mut out = Vec::new();
        let lines = record(TextRecorder::new(&mut out), consumer, Some(&header)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(lines, 4);
        assert_eq!(text.lines().next(), Some("timestamp,thing1,thing2"));
        assert_eq!(text.lines().count(), 4);
    }

    /// Rejects every write, like stdout closed by the reader of a pipe.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_winds_the_runner_down() {
        let observer = Observer::new("test", RandomSource::new()).unwrap();
        let (producer, consumer) = handoff(1);
        let settings = RunSettings {
            interval: Duration::from_millis(5),
            count: 0,
        };
        let runner = Runner::with_queue(observer, settings, producer).unwrap();
        let (handle, join) = runner.spawn().unwrap();

        let err = record(TextRecorder::new(BrokenPipe), consumer, None).unwrap_err();
        assert!(err.contains("failed to write"), "got: {err}");

        handle.stop().unwrap();
        let outcome = join.join().unwrap();
        assert!(matches!(
            outcome,
            Ok(_) | Err(crate::error::ObserverError::QueueClosed)
        ));
    }

    #[test]
    fn process_source_opens_lazily() {
        // A process that does not exist fails when sampled, not when opened.
        assert!(open_source(&ObserveSource::Process { pid: u32::MAX }).is_ok());
    }

    #[test]
    fn missing_storage_path_fails_to_open() {
        let Err(err) = open_source(&ObserveSource::Storage {
            path: "/definitely/not/here".into(),
        }) else {
            panic!("a missing path should not open");
        };

        assert!(err.contains("/definitely/not/here"));
    }
}
