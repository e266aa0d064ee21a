//! Threaded capture and processing loop
//!
//! A producer thread pulls frames from the [`FrameSource`] into a bounded
//! [`FrameQueue`] that evicts its oldest frame when full. The calling thread
//! waits for a full window, stacks it, runs the [`Scanner`] and hands the
//! cycle to a [`Sink`]. Both loops watch one [`CancellationToken`].

/// Overlay drawing
pub mod annotate;
/// Stop flag
pub mod cancel;
/// Bounded evicting frame buffer
pub mod queue;
/// Per-cycle processing
pub mod scanner;
/// Cycle consumers
pub mod sink;

pub use annotate::{AnnotationConfig, Annotator};
pub use cancel::CancellationToken;
pub use queue::{DrainOutcome, FrameQueue};
pub use scanner::Scanner;
pub use sink::{ChannelSink, CycleOutput, JsonLinesSink, LogSink, RegionResult, Sink, SinkControl};

use crate::config::{ScanConfig, SourceConfig};
use crate::error::{Result, ScanError};
use crate::source::{self, FrameSource};
use crate::stacker::FrameStacker;
use crossbeam_channel::{Receiver, SendError};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Built, source not opened yet
    Idle,
    /// Capturing and processing
    Running,
    /// Stop requested; finishing buffered work
    Draining,
    /// Source and sink released
    Stopped,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Idle,
            1 => PipelineState::Running,
            2 => PipelineState::Draining,
            _ => PipelineState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move Running -> Draining; no-op from any other state
    fn begin_draining(&self) {
        let _ = self.0.compare_exchange(
            PipelineState::Running as u8,
            PipelineState::Draining as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Cloneable view of a running pipeline
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    state: StateCell,
    token: CancellationToken,
}

impl PipelineHandle {
    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Ask the pipeline to drain and stop
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Shared stop flag
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ran out of frames
    EndOfStream,
    /// Stopped through the handle or token
    Cancelled,
    /// The sink asked to stop
    SinkRequested,
    /// The source failed repeatedly or fatally
    SourceFailed,
}

/// Counters for a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Stacked frames processed
    pub cycles: u64,
    /// Frames read from the source
    pub frames_captured: u64,
    /// Frames dropped by the queue before being stacked
    pub frames_evicted: u64,
    /// Decoded records handed to the sink
    pub results_emitted: u64,
    /// Why the run ended
    pub stop_reason: StopReason,
}

enum ProducerExit {
    EndOfStream,
    Cancelled,
    Failed(ScanError),
}

/// Capture loop run on the producer thread
fn produce(
    mut source: Box<dyn FrameSource>,
    queue: &FrameQueue,
    token: &CancellationToken,
    max_failures: u32,
    retry_delay: Duration,
) -> ProducerOutcome {
    let mut captured = 0u64;
    let mut failures = 0u32;
    let exit = loop {
        if token.is_cancelled() {
            break ProducerExit::Cancelled;
        }
        match source.next_frame() {
            Ok(frame) => {
                failures = 0;
                captured += 1;
                if queue.push(frame).is_some() {
                    trace!("queue full, evicted oldest frame");
                }
            }
            Err(ScanError::EndOfStream) => break ProducerExit::EndOfStream,
            Err(err) if !err.is_fatal() => {
                failures += 1;
                warn!(error = %err, failures, "frame capture failed");
                if failures > max_failures {
                    break ProducerExit::Failed(err);
                }
                thread::sleep(retry_delay);
            }
            Err(err) => break ProducerExit::Failed(err),
        }
    };
    source.close();
    queue.close();
    (exit, captured)
}

type ProducerOutcome = (ProducerExit, u64);

/// Start the capture thread and hand it the source
///
/// The source only moves once the thread exists; if spawning fails it is
/// closed here instead.
fn start_producer<F>(
    mut source: Box<dyn FrameSource>,
    spawn: F,
) -> Result<JoinHandle<ProducerOutcome>>
where
    F: FnOnce(Receiver<Box<dyn FrameSource>>) -> std::io::Result<JoinHandle<ProducerOutcome>>,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    match spawn(rx) {
        Ok(handle) => {
            if let Err(SendError(mut source)) = tx.send(source) {
                source.close();
            }
            Ok(handle)
        }
        Err(err) => {
            source.close();
            Err(err.into())
        }
    }
}

/// Capture, stack, scan and publish until stopped
pub struct Pipeline {
    config: ScanConfig,
    scanner: Scanner,
    state: StateCell,
    token: CancellationToken,
}

impl Pipeline {
    /// Validate the configuration and build every stage from it
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        let scanner = Scanner::from_config(&config);
        Ok(Self::with_scanner(config, scanner))
    }

    /// Pipeline around a prebuilt scanner (custom decoders or enhancers)
    pub fn with_scanner(config: ScanConfig, scanner: Scanner) -> Self {
        Self {
            config,
            scanner,
            state: StateCell::default(),
            token: CancellationToken::new(),
        }
    }

    /// Handle for observing state and stopping from another thread
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            state: self.state.clone(),
            token: self.token.clone(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Run with the source described by the configuration
    pub fn run<S: Sink + ?Sized>(self, sink: &mut S) -> Result<PipelineReport> {
        self.run_with(source::open, sink)
    }

    /// Run with a custom source opener
    ///
    /// Blocks the calling thread until the source ends, the token is
    /// cancelled, the sink asks to stop or a fatal error occurs. The source
    /// and the sink are each closed exactly once.
    pub fn run_with<F, S>(self, open: F, sink: &mut S) -> Result<PipelineReport>
    where
        F: FnOnce(&SourceConfig) -> Result<Box<dyn FrameSource>>,
        S: Sink + ?Sized,
    {
        let result = self.run_inner(open, sink);
        self.state.set(PipelineState::Stopped);
        sink.close();
        match &result {
            Ok(report) => info!(
                cycles = report.cycles,
                results = report.results_emitted,
                reason = ?report.stop_reason,
                "pipeline stopped"
            ),
            Err(err) => error!(stage = err.stage(), error = %err, "pipeline failed"),
        }
        result
    }

    fn run_inner<F, S>(&self, open: F, sink: &mut S) -> Result<PipelineReport>
    where
        F: FnOnce(&SourceConfig) -> Result<Box<dyn FrameSource>>,
        S: Sink + ?Sized,
    {
        let source = open(&self.config.source)?;
        info!(source = %source.describe(), stack_size = self.config.stack_size, "pipeline running");
        self.state.set(PipelineState::Running);

        let queue = Arc::new(FrameQueue::new(self.config.stack_size));
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let producer = {
            let queue = Arc::clone(&queue);
            let token = self.token.clone();
            let state = self.state.clone();
            let max_failures = self.config.source.max_consecutive_failures;
            start_producer(source, move |handoff| {
                thread::Builder::new()
                    .name("frame-producer".into())
                    .spawn(move || {
                        let outcome = match handoff.recv() {
                            Ok(source) => produce(source, &queue, &token, max_failures, poll),
                            Err(_) => {
                                queue.close();
                                (ProducerExit::Cancelled, 0)
                            }
                        };
                        state.begin_draining();
                        outcome
                    })
            })?
        };

        let stacker = FrameStacker::new(self.config.stack_size);
        let mut cycles = 0u64;
        let mut results_emitted = 0u64;
        let mut sink_stopped = false;
        let mut fatal = None;

        loop {
            if self.token.is_cancelled() {
                self.state.begin_draining();
            }
            let frames = match queue.drain_exact(stacker.size(), poll) {
                DrainOutcome::Frames(frames) => frames,
                DrainOutcome::Timeout => continue,
                DrainOutcome::Closed => break,
            };

            let stacked = match stacker.stack(&frames) {
                Ok(stacked) => stacked,
                Err(err) => {
                    self.token.cancel();
                    fatal = Some(err);
                    break;
                }
            };

            let output = self.scanner.process(&stacked, cycles);
            cycles += 1;
            results_emitted += output.results.len() as u64;
            if sink.consume(output) == SinkControl::Stop {
                debug!(cycle = cycles - 1, "sink requested stop");
                sink_stopped = true;
                self.token.cancel();
                self.state.begin_draining();
                break;
            }
        }

        let (exit, frames_captured) = producer
            .join()
            .map_err(|_| ScanError::WorkerPanic("frame producer".into()))?;
        if let Some(err) = fatal {
            return Err(err);
        }

        let stop_reason = if sink_stopped {
            StopReason::SinkRequested
        } else {
            match exit {
                ProducerExit::EndOfStream => StopReason::EndOfStream,
                ProducerExit::Cancelled => StopReason::Cancelled,
                ProducerExit::Failed(err) => {
                    error!(error = %err, "frame source failed");
                    StopReason::SourceFailed
                }
            }
        };

        Ok(PipelineReport {
            cycles,
            frames_captured,
            frames_evicted: queue.evicted(),
            results_emitted,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), PipelineState::Idle);
        cell.begin_draining();
        assert_eq!(cell.get(), PipelineState::Idle);
        cell.set(PipelineState::Running);
        cell.begin_draining();
        assert_eq!(cell.get(), PipelineState::Draining);
    }

    struct ClosingSource(Arc<std::sync::atomic::AtomicUsize>);

    impl FrameSource for ClosingSource {
        fn next_frame(&mut self) -> Result<crate::models::Frame> {
            Err(ScanError::EndOfStream)
        }

        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "closing".into()
        }
    }

    #[test]
    fn test_source_closed_when_thread_cannot_start() {
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let source = Box::new(ClosingSource(Arc::clone(&closes)));
        let err = start_producer(source, |_| Err(std::io::Error::other("no threads left")))
            .unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_started_producer_owns_source() {
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let source = Box::new(ClosingSource(Arc::clone(&closes)));
        let handle = start_producer(source, |handoff| {
            thread::Builder::new().spawn(move || {
                let mut source = handoff.recv().unwrap();
                source.close();
                (ProducerExit::EndOfStream, 0)
            })
        })
        .unwrap();
        let (exit, captured) = handle.join().unwrap();
        assert!(matches!(exit, ProducerExit::EndOfStream));
        assert_eq!(captured, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScanConfig {
            stack_size: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(Pipeline::new(config), Err(ScanError::Config(_))));
    }
}
