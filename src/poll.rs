//! Timer-driven poll loop: read, decode, publish, notify.
//!
//! Everything happens on the calling thread. A tick runs to completion before
//! the loop sleeps, so ticks never overlap. Scheduling is fixed-rate: the next
//! tick is due one interval after the previous tick *started*. A tick that
//! overruns the interval is followed immediately by the next one, and the
//! schedule restarts from there instead of trying to catch up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

use crate::error::{Result, TelemetryError};
use crate::source::BufferSource;
use crate::store::ValueStore;
use crate::structdef::SnapshotDecoder;

/// Default polling period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Receives a notification after every successful publish.
///
/// Consumers pull whatever they need from the store.
pub trait SnapshotConsumer {
    fn notify(&mut self, store: &ValueStore);
}

/// Result of a single tick that did not lose the source.
#[derive(Debug)]
pub enum TickOutcome {
    /// A fresh snapshot was published
    Published,
    /// Decoding failed; the previous snapshot was kept
    Stale(TelemetryError),
}

/// Counters accumulated over the life of a poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub published: u64,
    pub stale: u64,
}

/// Shared flag used to stop a running loop from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Drives a decoder against a buffer source at a fixed interval.
pub struct Poller<'a, S> {
    source: S,
    decoder: SnapshotDecoder,
    store: ValueStore,
    interval: Duration,
    consumers: Vec<&'a mut dyn SnapshotConsumer>,
    stats: PollStats,
}

impl<'a, S: BufferSource> Poller<'a, S> {
    pub fn new(source: S, decoder: SnapshotDecoder, interval: Duration) -> Self {
        Self {
            source,
            decoder,
            store: ValueStore::new(),
            interval,
            consumers: Vec::new(),
            stats: PollStats::default(),
        }
    }

    /// Publish into an existing store instead of a fresh one.
    pub fn with_store(mut self, store: ValueStore) -> Self {
        self.store = store;
        self
    }

    /// Register a consumer notified after each publish, in registration order.
    pub fn register(&mut self, consumer: &'a mut dyn SnapshotConsumer) {
        self.consumers.push(consumer);
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn decoder(&self) -> &SnapshotDecoder {
        &self.decoder
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Run one read, decode, publish cycle.
    ///
    /// Returns `Err` only when the source is gone; other failures are logged
    /// and reported as [`TickOutcome::Stale`].
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.stats.ticks += 1;

        let decoded = match self.source.read() {
            Ok(bytes) => self.decoder.decode(bytes),
            Err(e) => Err(e),
        };

        match decoded {
            Ok(snapshot) => {
                self.store.publish(snapshot);
                self.stats.published += 1;
                trace!(tick = self.stats.ticks, "published snapshot");

                for consumer in self.consumers.iter_mut() {
                    consumer.notify(&self.store);
                }
                Ok(TickOutcome::Published)
            }
            Err(e) if e.is_source_loss() => {
                error!(error = %e, "buffer source lost, stopping poll loop");
                Err(e)
            }
            Err(e) => {
                self.stats.stale += 1;
                warn!(error = %e, tick = self.stats.ticks, "tick failed, keeping previous snapshot");
                Ok(TickOutcome::Stale(e))
            }
        }
    }

    /// Poll until stopped or until the source is lost.
    pub fn run(&mut self, stop: &StopHandle) -> Result<PollStats> {
        self.run_inner(None, stop)
    }

    /// Poll at most `max_ticks` times.
    pub fn run_ticks(&mut self, max_ticks: u64, stop: &StopHandle) -> Result<PollStats> {
        self.run_inner(Some(max_ticks), stop)
    }

    fn run_inner(&mut self, max_ticks: Option<u64>, stop: &StopHandle) -> Result<PollStats> {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            fields = self.decoder.plan().len(),
            "poll loop started"
        );

        let mut remaining = max_ticks;
        while !stop.is_stopped() && remaining != Some(0) {
            let started = Instant::now();

            if let Err(e) = self.tick() {
                self.log_exit();
                return Err(e);
            }

            if let Some(n) = remaining.as_mut() {
                *n -= 1;
                if *n == 0 {
                    break;
                }
            }

            let due = started + self.interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        self.log_exit();
        Ok(self.stats)
    }

    fn log_exit(&self) {
        info!(
            ticks = self.stats.ticks,
            published = self.stats.published,
            stale = self.stats.stale,
            "poll loop stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::structdef::{FieldDescriptor, FieldKind, LayoutCompiler, Schema, Value};

    fn decoder() -> SnapshotDecoder {
        let schema = Schema {
            struct_name: "SharedMemory".to_string(),
            fields: vec![
                FieldDescriptor::new("mSpeed", FieldKind::Float32),
                FieldDescriptor::new("mGear", FieldKind::UInt32),
            ],
        };
        SnapshotDecoder::new(LayoutCompiler::compile(&schema).unwrap())
    }

    fn buffer(speed: f32, gear: u32) -> Vec<u8> {
        let mut data = speed.to_le_bytes().to_vec();
        data.extend_from_slice(&gear.to_le_bytes());
        data
    }

    #[derive(Default)]
    struct CountingConsumer {
        notified: usize,
        last_speed: Option<Value>,
    }

    impl SnapshotConsumer for CountingConsumer {
        fn notify(&mut self, store: &ValueStore) {
            self.notified += 1;
            self.last_speed = store.value("mSpeed").ok();
        }
    }

    #[test]
    fn test_tick_publishes() {
        let mut poller = Poller::new(
            MemorySource::new(buffer(55.5, 4)),
            decoder(),
            DEFAULT_INTERVAL,
        );

        assert!(matches!(poller.tick().unwrap(), TickOutcome::Published));
        assert_eq!(poller.store().value("mSpeed").unwrap(), Value::Float32(55.5));
        assert_eq!(poller.store().value("mGear").unwrap(), Value::UInt32(4));
    }

    #[test]
    fn test_failed_tick_keeps_stale_snapshot() {
        let mut poller = Poller::new(MemorySource::new(buffer(10.0, 1)), decoder(), DEFAULT_INTERVAL);
        poller.tick().unwrap();

        poller.source_mut().replace(vec![0u8; 3]);
        match poller.tick().unwrap() {
            TickOutcome::Stale(TelemetryError::BufferTooSmall { required, actual }) => {
                assert_eq!(required, 8);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected stale tick, got {:?}", other),
        }

        assert_eq!(poller.store().value("mSpeed").unwrap(), Value::Float32(10.0));
        assert_eq!(
            poller.stats(),
            PollStats {
                ticks: 2,
                published: 1,
                stale: 1
            }
        );
    }

    #[test]
    fn test_consumers_notified_only_on_publish() {
        let mut consumer = CountingConsumer::default();
        {
            let mut poller = Poller::new(MemorySource::new(vec![]), decoder(), DEFAULT_INTERVAL);
            poller.register(&mut consumer);

            poller.tick().unwrap();
            poller.source_mut().replace(buffer(3.0, 2));
            poller.tick().unwrap();
        }

        assert_eq!(consumer.notified, 1);
        assert_eq!(consumer.last_speed, Some(Value::Float32(3.0)));
    }

    #[test]
    fn test_source_loss_stops_loop() {
        let mut source = MemorySource::new(buffer(1.0, 1));
        source.close();
        let mut poller = Poller::new(source, decoder(), Duration::from_millis(1));

        let err = poller.run(&StopHandle::new()).unwrap_err();
        assert!(err.is_source_loss());
        assert_eq!(poller.stats().ticks, 1);
        assert!(!poller.store().is_initialized());
    }

    #[test]
    fn test_run_ticks_bounded() {
        let mut poller = Poller::new(MemorySource::new(buffer(1.0, 1)), decoder(), Duration::from_millis(1));

        let stats = poller.run_ticks(5, &StopHandle::new()).unwrap();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.published, 5);
        assert_eq!(poller.store().publish_count(), 5);
    }

    #[test]
    fn test_stopped_handle_runs_nothing() {
        let stop = StopHandle::new();
        stop.stop();
        let mut poller = Poller::new(MemorySource::new(buffer(1.0, 1)), decoder(), Duration::from_millis(1));

        let stats = poller.run(&stop).unwrap();
        assert_eq!(stats.ticks, 0);
    }

    #[test]
    fn test_fixed_rate_spacing() {
        let mut poller = Poller::new(MemorySource::new(buffer(1.0, 1)), decoder(), Duration::from_millis(20));

        let start = Instant::now();
        poller.run_ticks(3, &StopHandle::new()).unwrap();

        // Two sleeps between three ticks, none after the last one.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_stable_input_gives_identical_snapshots() {
        let mut poller = Poller::new(MemorySource::new(buffer(88.0, 5)), decoder(), DEFAULT_INTERVAL);

        poller.tick().unwrap();
        let first = poller.store().current().unwrap();
        poller.tick().unwrap();
        let second = poller.store().current().unwrap();

        assert_eq!(*first, *second);
    }

    #[test]
    fn test_stop_from_other_thread() {
        let stop = StopHandle::new();
        let remote = stop.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.stop();
        });

        let mut poller = Poller::new(MemorySource::new(buffer(1.0, 1)), decoder(), Duration::from_millis(5));
        let stats = poller.run(&stop).unwrap();
        handle.join().unwrap();

        assert!(stats.ticks >= 1);
    }
}
