// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writer/reader thread pair driving one exchange.
//!
//! ```text
//! [syncbuf-writer]  TestTone::render -> BlockSink::publish      (every write_interval)
//!                                         |
//!                                      exchange
//!                                         |
//! [syncbuf-reader]  BlockSource::poll_into -> BlockConsumer::consume (meter, recorder, ...)
//! ```
//!
//! The writer loop allocates its scratch block once and never waits on the
//! reader.

use crate::audio::{BlockConsumer, TestTone};
use crate::config::SessionConfig;
use crate::realtime::{BlockSink, BlockSource, ExchangeError, Sample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session thread error: {0}")]
    Thread(String),
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

/// What happened during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Blocks the writer published.
    pub published: u64,
    /// Blocks the reader took.
    pub delivered: u64,
    /// Generations overwritten before the reader saw them.
    pub missed: u64,
    /// Deliveries the exchange flagged as overlapping a write.
    pub not_intact: u64,
    pub elapsed: Duration,
}

/// One writer thread, one reader thread, any number of consumers.
pub struct Session<S: Sample> {
    config: SessionConfig,
    tone: TestTone,
    consumers: Vec<Box<dyn BlockConsumer<S>>>,
}

impl<S: Sample> Session<S> {
    pub fn new(config: SessionConfig, tone: TestTone) -> Self {
        Self {
            config,
            tone,
            consumers: Vec::new(),
        }
    }

    pub fn add_consumer(&mut self, consumer: impl BlockConsumer<S> + 'static) {
        self.consumers.push(Box::new(consumer));
    }

    /// Run to completion: the writer publishes `cycles` blocks, the reader
    /// drains until the writer is done and nothing fresh remains.
    pub fn run<W, R>(self, sink: W, source: R) -> Result<SessionReport, SessionError>
    where
        W: BlockSink<S> + 'static,
        R: BlockSource<S> + 'static,
    {
        let layout = sink.layout();
        if source.layout() != layout {
            return Err(ExchangeError::LayoutMismatch {
                expected: layout,
                actual: source.layout(),
            }
            .into());
        }

        info!(
            "Starting session: {} cycles, {} frames x {} ch, write every {}us",
            self.config.cycles,
            layout.frames(),
            layout.channels(),
            self.config.write_interval_us
        );

        let started = Instant::now();
        let writer_done = Arc::new(AtomicBool::new(false));

        let writer = spawn_writer::<S, W>(
            sink,
            self.tone,
            self.config.cycles,
            Duration::from_micros(self.config.write_interval_us),
            Arc::clone(&writer_done),
        )?;
        let reader = spawn_reader::<S, R>(
            source,
            self.consumers,
            Duration::from_micros(self.config.read_interval_us),
            writer_done,
        )?;

        // Both threads are joined before any error is returned, so consumers
        // have finished when `run()` returns.
        let published = join(writer, "writer");
        let report = join(reader, "reader");
        let published = published??;
        let mut report = report??;
        report.published = published;
        report.elapsed = started.elapsed();

        info!(
            "Session finished in {:?}: published {}, delivered {}, missed {}, not intact {}",
            report.elapsed, report.published, report.delivered, report.missed, report.not_intact
        );
        Ok(report)
    }
}

fn join<T>(handle: JoinHandle<T>, name: &str) -> Result<T, SessionError> {
    handle.join().map_err(|_| {
        error!("{} thread panicked", name);
        SessionError::Thread(format!("{} thread panicked", name))
    })
}

fn spawn_writer<S, W>(
    mut sink: W,
    mut tone: TestTone,
    cycles: u64,
    interval: Duration,
    done: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<u64, ExchangeError>>, SessionError>
where
    S: Sample,
    W: BlockSink<S> + 'static,
{
    thread::Builder::new()
        .name("syncbuf-writer".to_string())
        .spawn(move || -> Result<u64, ExchangeError> {
            let layout = sink.layout();
            let mut scratch = vec![S::default(); layout.len()];

            let mut run = || -> Result<u64, ExchangeError> {
                let mut published = 0;
                for _ in 0..cycles {
                    let next = sink.generation() + 1;
                    tone.render(&layout, next, &mut scratch);
                    sink.publish(&scratch)?;
                    published += 1;
                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                }
                Ok(published)
            };
            let result = run();

            done.store(true, Ordering::Release);
            debug!("Writer thread exiting");
            result
        })
        .map_err(|e| SessionError::Thread(e.to_string()))
}

fn spawn_reader<S, R>(
    mut source: R,
    mut consumers: Vec<Box<dyn BlockConsumer<S>>>,
    interval: Duration,
    writer_done: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<SessionReport, ExchangeError>>, SessionError>
where
    S: Sample,
    R: BlockSource<S> + 'static,
{
    thread::Builder::new()
        .name("syncbuf-reader".to_string())
        .spawn(move || -> Result<SessionReport, ExchangeError> {
            let layout = source.layout();
            let mut block = vec![S::default(); layout.len()];
            let mut report = SessionReport::default();

            loop {
                // Loaded before polling so the final publication is never lost.
                let finished = writer_done.load(Ordering::Acquire);
                match source.poll_into(&mut block)? {
                    Some(delivery) => {
                        report.delivered += 1;
                        report.missed += delivery.missed;
                        if !delivery.intact {
                            report.not_intact += 1;
                        }
                        for consumer in consumers.iter_mut() {
                            consumer.consume(&layout, &block, &delivery);
                        }
                    }
                    None if finished => break,
                    None if interval.is_zero() => thread::yield_now(),
                    None => thread::sleep(interval),
                }
            }

            for consumer in consumers.iter_mut() {
                consumer.finish();
            }
            debug!("Reader thread exiting");
            Ok(report)
        })
        .map_err(|e| SessionError::Thread(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{BlockLayout, BlockMeter, Recorder, TagValidator};
    use crate::config::ExchangeKind;
    use crate::realtime::{Delivery, SynchronizedBuffer, TripleBuffer};
    use tempfile::tempdir;

    fn config(exchange: ExchangeKind, cycles: u64, write_us: u64, read_us: u64) -> SessionConfig {
        SessionConfig {
            exchange,
            cycles,
            write_interval_us: write_us,
            read_interval_us: read_us,
            ..Default::default()
        }
    }

    #[test]
    fn test_triple_session_accounts_for_every_generation() {
        let layout = BlockLayout::interleaved(256, 2).unwrap();
        let (sink, source) = TripleBuffer::<f32>::new(layout).split();

        let validator = TagValidator::new();
        let handle = validator.handle();
        let mut session = Session::new(config(ExchangeKind::Triple, 5_000, 0, 0), TestTone::tagged());
        session.add_consumer(validator);

        let report = session.run(sink, source).unwrap();
        assert_eq!(report.published, 5_000);
        assert_eq!(report.delivered + report.missed, 5_000);
        assert_eq!(report.not_intact, 0);

        let summary = handle.summary();
        assert_eq!(summary.checked, report.delivered);
        assert_eq!(summary.torn, 0);
    }

    #[test]
    fn test_single_session_tears_are_flagged() {
        let layout = BlockLayout::interleaved(2048, 2).unwrap();
        let (sink, source) = SynchronizedBuffer::<i32>::new(layout).split();

        let validator = TagValidator::new();
        let handle = validator.handle();
        let mut session = Session::new(config(ExchangeKind::Single, 5_000, 0, 0), TestTone::tagged());
        session.add_consumer(validator);

        let report = session.run(sink, source).unwrap();
        assert_eq!(report.delivered + report.missed, 5_000);

        let summary = handle.summary();
        assert_eq!(summary.flagged, report.not_intact);
        assert_eq!(summary.torn_unflagged, 0);
    }

    #[test]
    fn test_paced_single_session_delivers_everything() {
        let layout = BlockLayout::interleaved(64, 2).unwrap();
        let (sink, source) = SynchronizedBuffer::<f32>::new(layout).split();

        let meter = BlockMeter::new(2);
        let levels = meter.levels();
        let mut session = Session::new(
            config(ExchangeKind::Single, 20, 5_000, 0),
            TestTone::sine(440.0, 48_000),
        );
        session.add_consumer(meter);

        let report = session.run(sink, source).unwrap();
        assert_eq!(report.published, 20);
        assert!(report.delivered >= 1);
        assert_eq!(report.delivered + report.missed, 20);
        assert!(levels.peak(0) > 0.0);
        assert!(levels.peak(0) <= 0.5 + 1e-6);
    }

    #[test]
    fn test_recorder_finalized_at_end_of_session() {
        let dir = tempdir().unwrap();
        let layout = BlockLayout::interleaved(128, 1).unwrap();
        let (sink, source) = TripleBuffer::<f32>::new(layout).split();

        let mut recorder = Recorder::new(dir.path(), layout, 48_000, false);
        recorder.record().unwrap();
        let path = recorder.recorded_path().unwrap().to_path_buf();

        let mut session = Session::new(
            config(ExchangeKind::Triple, 10, 1_000, 100),
            TestTone::sine(220.0, 48_000),
        );
        session.add_consumer(recorder);
        let report = session.run(sink, source).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len() as u64, report.delivered * 128);
    }

    #[test]
    fn test_mismatched_layouts_rejected() {
        let (sink, _) = TripleBuffer::<f32>::new(BlockLayout::interleaved(4, 2).unwrap()).split();
        let (_, source) = TripleBuffer::<f32>::new(BlockLayout::interleaved(8, 2).unwrap()).split();
        let session = Session::new(SessionConfig::default(), TestTone::tagged());
        assert!(matches!(
            session.run(sink, source),
            Err(SessionError::Exchange(ExchangeError::LayoutMismatch { .. }))
        ));
    }

    #[test]
    fn test_same_length_different_format_rejected() {
        let interleaved = BlockLayout::interleaved(4, 2).unwrap();
        let planar = BlockLayout::planar(4, 2).unwrap();
        let (sink, _) = TripleBuffer::<f32>::new(interleaved).split();
        let (_, source) = TripleBuffer::<f32>::new(planar).split();
        let session = Session::new(SessionConfig::default(), TestTone::tagged());

        match session.run(sink, source) {
            Err(SessionError::Exchange(ExchangeError::LayoutMismatch { expected, actual })) => {
                assert_eq!(expected, interleaved);
                assert_eq!(actual, planar);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Accepts the first block, then rejects everything.
    struct FailingSink {
        layout: BlockLayout,
        generation: u64,
    }

    impl BlockSink<f32> for FailingSink {
        fn layout(&self) -> BlockLayout {
            self.layout
        }

        fn generation(&self) -> u64 {
            self.generation
        }

        fn publish(&mut self, block: &[f32]) -> Result<u64, ExchangeError> {
            if self.generation > 0 {
                return Err(ExchangeError::BlockSizeMismatch {
                    expected: self.layout.len(),
                    actual: block.len() + 1,
                });
            }
            self.generation += 1;
            Ok(self.generation)
        }
    }

    /// Counts `finish()` calls into a shared flag.
    struct FinishFlag(Arc<AtomicBool>);

    impl BlockConsumer<f32> for FinishFlag {
        fn consume(&mut self, _layout: &BlockLayout, _block: &[f32], _delivery: &Delivery) {}

        fn finish(&mut self) {
            thread::sleep(Duration::from_millis(20));
            self.0.store(true, Ordering::Release);
        }
    }

    #[test]
    fn test_writer_error_waits_for_reader_to_finish() {
        let layout = BlockLayout::interleaved(4, 1).unwrap();
        let (_, source) = TripleBuffer::<f32>::new(layout).split();
        let sink = FailingSink {
            layout,
            generation: 0,
        };

        let finished = Arc::new(AtomicBool::new(false));
        let mut session = Session::new(config(ExchangeKind::Triple, 10, 0, 0), TestTone::tagged());
        session.add_consumer(FinishFlag(Arc::clone(&finished)));

        assert!(matches!(
            session.run(sink, source),
            Err(SessionError::Exchange(ExchangeError::BlockSizeMismatch { .. }))
        ));
        assert!(finished.load(Ordering::Acquire));
    }
}
