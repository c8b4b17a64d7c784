//! Radar Data Manager: a single-producer staging buffer shared by subscribers.
//!
//! The producer side calls [`RadarDataManager::run_from_isr`] (or
//! [`RadarDataManager::run`] from task context) whenever the sensor has data.
//! Each run pulls bytes into the staging buffer and, once `fill_level` bytes
//! are buffered, wakes every subscriber. Subscribers read the window with
//! [`RadarDataManager::read_from_buffer`] and release it with
//! [`RadarDataManager::ack`]; the window is dropped from the buffer on the
//! first run after the last subscriber acknowledges.
//!
//! Nothing stops a subscriber from acknowledging a window it never read, or
//! from holding on to a window it read but never acknowledged. A subscriber
//! that never acknowledges stalls compaction for everyone.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use serde::Serialize;

use crate::buffer::{BufferAllocator, StagingBuffer, SystemAllocator};
use crate::prelude::{ManagerConfig, Producer, RdmError, RdmResult, MAX_SUBSCRIBERS};
use crate::registry::{SubscriberId, SubscriptionRegistry};
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::wake::{ConsumerHandle, WakeContext};

/// Producer claimed more bytes than it was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestAnomaly {
    pub reported: usize,
    pub requested: usize,
}

/// Outcome of a single [`RadarDataManager::run`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub ingested: usize,
    pub anomaly: Option<IngestAnomaly>,
    pub producer_failed: bool,
    pub notified: usize,
    pub compacted: bool,
    pub reset: bool,
}

/// Where the current acknowledgement cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Filling,
    Notified,
    Draining,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerState {
    pub capacity: usize,
    pub head: usize,
    pub tail: usize,
    pub buffered: usize,
    pub fill_level: usize,
    pub subscribers: usize,
    pub phase: CyclePhase,
}

pub struct RadarDataManager<P: Producer> {
    producer: P,
    allocator: Box<dyn BufferAllocator>,
    pending_allocator: Option<Box<dyn BufferAllocator>>,
    staging: Option<StagingBuffer>,
    registry: SubscriptionRegistry,
    fill_level: usize,
    notified: bool,
    producer_thread: Option<ThreadId>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<P: Producer> RadarDataManager<P> {
    /// Creates an uninitialized manager with [`MAX_SUBSCRIBERS`] slots.
    pub fn new(producer: P) -> Self {
        Self::with_slots(producer, MAX_SUBSCRIBERS)
    }

    pub fn with_slots(producer: P, max_subscribers: usize) -> Self {
        Self {
            producer,
            allocator: Box::new(SystemAllocator),
            pending_allocator: None,
            staging: None,
            registry: SubscriptionRegistry::with_capacity(max_subscribers),
            fill_level: 0,
            notified: false,
            producer_thread: None,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::default(),
        }
    }

    /// Creates and initializes a manager in one step.
    pub fn with_config(producer: P, config: &ManagerConfig) -> RdmResult<Self> {
        config.validate()?;
        let mut manager = Self::with_slots(producer, config.max_subscribers);
        manager.init(config.buffer_size, config.fill_level)?;
        Ok(manager)
    }

    /// Replaces the buffer allocator. Takes effect at the next [`Self::init`];
    /// a live buffer is still returned to the allocator it came from.
    pub fn set_allocator(&mut self, allocator: Box<dyn BufferAllocator>) {
        if self.staging.is_some() {
            self.pending_allocator = Some(allocator);
        } else {
            self.allocator = allocator;
        }
    }

    pub fn init(&mut self, buffer_size: usize, fill_level: usize) -> RdmResult<()> {
        if self.staging.is_some() {
            return Err(RdmError::OperationBlocked("manager already initialized".into()));
        }
        if buffer_size == 0 || fill_level == 0 || fill_level > buffer_size {
            return Err(RdmError::InvalidParam(format!(
                "buffer size {} / fill level {} (need 0 < fill <= size)",
                buffer_size, fill_level
            )));
        }

        let mut buffer = self.allocator.allocate(buffer_size)?;
        if buffer.len() != buffer_size {
            self.allocator.release(buffer);
            return Err(RdmError::AllocationFailed(buffer_size));
        }
        buffer.fill(0);

        self.staging = Some(StagingBuffer::new(buffer));
        self.fill_level = fill_level;
        self.notified = false;
        self.logger.record(&format!(
            "initialized staging buffer: {} bytes, fill level {}",
            buffer_size, fill_level
        ));
        Ok(())
    }

    /// Releases the staging buffer. Refused while subscribers remain.
    pub fn deinit(&mut self) -> RdmResult<()> {
        if self.registry.active() > 0 {
            return Err(RdmError::OperationBlocked(format!(
                "{} subscriber(s) still registered",
                self.registry.active()
            )));
        }
        let staging = self
            .staging
            .take()
            .ok_or_else(|| RdmError::OperationBlocked("manager not initialized".into()))?;

        self.allocator.release(staging.into_inner());
        if let Some(allocator) = self.pending_allocator.take() {
            self.allocator = allocator;
        }
        self.fill_level = 0;
        self.notified = false;
        self.producer_thread = None;
        self.logger.record("released staging buffer");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.staging.is_some()
    }

    pub fn subscribe(&mut self, handle: ConsumerHandle) -> RdmResult<SubscriberId> {
        if handle.name().is_empty() {
            return Err(RdmError::InvalidParam("subscriber name is empty".into()));
        }
        if self.staging.is_none() {
            return Err(RdmError::CapacityExceeded(self.registry.capacity()));
        }
        let name = handle.name().to_string();
        let id = self.registry.subscribe(handle)?;
        self.logger
            .trace_cycle(&format!("subscriber {} registered as {}", name, id));
        Ok(id)
    }

    /// Frees a subscription. Unknown ids are ignored. Buffer state is untouched;
    /// if the subscriber was the last one holding back a window, the next run
    /// compacts it.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        if let Some(handle) = self.registry.unsubscribe(id) {
            self.logger
                .trace_cycle(&format!("subscriber {} ({}) removed", id, handle.name()));
        }
    }

    pub fn subscribers(&self) -> usize {
        self.registry.active()
    }

    pub fn subscriber_name(&self, id: SubscriberId) -> Option<&str> {
        self.registry.name(id)
    }

    /// Producer entry point for task context.
    pub fn run(&mut self) -> RdmResult<RunReport> {
        self.run_in(WakeContext::Task)
    }

    /// Producer entry point for interrupt context.
    pub fn run_from_isr(&mut self) -> RdmResult<RunReport> {
        self.run_in(WakeContext::Interrupt)
    }

    fn run_in(&mut self, context: WakeContext) -> RdmResult<RunReport> {
        if self.staging.is_none() {
            return Err(RdmError::NotReady("manager not initialized".into()));
        }
        self.claim_producer_thread()?;

        let Some(staging) = self.staging.as_mut() else {
            return Err(RdmError::NotReady("manager not initialized".into()));
        };
        let mut report = RunReport::default();

        let requested = staging.room();
        if requested > 0 {
            match self.producer.read(staging.spare_mut()) {
                Ok(produced) if staging.commit(produced) => report.ingested = produced,
                Ok(produced) => {
                    self.metrics.record_anomaly();
                    self.logger.warn(&format!(
                        "producer reported {} bytes for a {} byte read, dropping",
                        produced, requested
                    ));
                    report.anomaly = Some(IngestAnomaly {
                        reported: produced,
                        requested,
                    });
                }
                Err(err) => {
                    self.metrics.record_producer_error();
                    self.logger.warn(&format!("producer read failed: {}", err));
                    report.producer_failed = true;
                }
            }
        }
        self.metrics.record_run(report.ingested);

        if staging.buffered() >= self.fill_level {
            if let Some(window) = staging.window(self.fill_level) {
                report.notified = self.registry.notify_all(context, window);
            }
            self.metrics.record_wakes(context, report.notified);
            self.notified = true;

            if self.registry.all_acknowledged() {
                staging.compact(self.fill_level);
                self.registry.clear_acknowledgements();
                self.notified = false;
                report.compacted = true;
                self.metrics.record_compaction();
                self.logger.trace_cycle(&format!(
                    "compacted {} bytes, {} remain",
                    self.fill_level,
                    staging.buffered()
                ));
            }
        }

        if staging.reset_if_exhausted() {
            report.reset = true;
            self.notified = false;
            self.metrics.record_overflow_reset();
            self.logger.trace_cycle("staging buffer exhausted, reset");
        }

        Ok(report)
    }

    fn claim_producer_thread(&mut self) -> RdmResult<()> {
        let current = thread::current().id();
        match self.producer_thread {
            None => {
                self.producer_thread = Some(current);
                Ok(())
            }
            Some(owner) if owner == current => Ok(()),
            Some(owner) => {
                self.logger.fault(&format!(
                    "run called from {:?}, manager is bound to producer {:?}",
                    current, owner
                ));
                Err(RdmError::OperationBlocked(
                    "run must only be called from the producer thread".into(),
                ))
            }
        }
    }

    /// The current `fill_level` window. Valid until the next compaction, which
    /// the borrow enforces.
    pub fn read_from_buffer(&self, id: SubscriberId) -> RdmResult<&[u8]> {
        if id.get() == 0 || id.get() > self.registry.capacity() {
            return Err(RdmError::InvalidParam(format!(
                "subscriber {} outside 1..={}",
                id,
                self.registry.capacity()
            )));
        }
        if !self.registry.is_registered(id) {
            return Err(RdmError::NotReady(format!("subscriber {} is not registered", id)));
        }
        self.staging
            .as_ref()
            .and_then(|staging| staging.window(self.fill_level))
            .ok_or_else(|| RdmError::NotReady("fill level not reached".into()))
    }

    /// Whether the subscriber already acknowledged the current window. A woken
    /// subscriber that finds this set is looking at a window it has handled.
    pub fn is_acknowledged(&self, id: SubscriberId) -> bool {
        self.registry.is_acknowledged(id)
    }

    /// Marks the subscriber as done with the current window.
    pub fn ack(&mut self, id: SubscriberId) -> RdmResult<()> {
        self.registry.acknowledge(id)
    }

    pub fn set_fill_level(&mut self, fill_level: usize) -> RdmResult<()> {
        let capacity = self.staging.as_ref().map_or(0, StagingBuffer::capacity);
        if fill_level == 0 || fill_level > capacity {
            return Err(RdmError::InvalidParam(format!(
                "fill level {} outside 1..={}",
                fill_level, capacity
            )));
        }
        self.fill_level = fill_level;
        Ok(())
    }

    pub fn fill_level(&self) -> usize {
        self.fill_level
    }

    pub fn state(&self) -> ManagerState {
        let (capacity, head, tail) = self
            .staging
            .as_ref()
            .map_or((0, 0, 0), |s| (s.capacity(), s.head(), s.tail()));
        let buffered = tail - head;
        let phase = if self.notified {
            if self.registry.any_acknowledged() {
                CyclePhase::Draining
            } else {
                CyclePhase::Notified
            }
        } else if buffered == 0 {
            CyclePhase::Idle
        } else {
            CyclePhase::Filling
        };

        ManagerState {
            capacity,
            head,
            tail,
            buffered,
            fill_level: self.fill_level,
            subscribers: self.registry.active(),
            phase,
        }
    }

    /// Raw staging bytes, including the unused region past `tail`.
    pub fn staged_bytes(&self) -> &[u8] {
        self.staging
            .as_ref()
            .map(StagingBuffer::as_bytes)
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedAllocator;
    use crate::wake::TaskNotifier;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Producer fed by the test; an empty queue yields zero bytes.
    #[derive(Default)]
    struct Script {
        chunks: VecDeque<Vec<u8>>,
        overreport: Option<usize>,
        fail_next: bool,
    }

    impl Script {
        fn feed(&mut self, bytes: &[u8]) {
            self.chunks.push_back(bytes.to_vec());
        }
    }

    impl Producer for Script {
        fn read(&mut self, dst: &mut [u8]) -> RdmResult<usize> {
            if std::mem::take(&mut self.fail_next) {
                return Err(RdmError::Producer("fifo underrun".into()));
            }
            if let Some(count) = self.overreport.take() {
                return Ok(count);
            }
            let Some(chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let count = chunk.len().min(dst.len());
            dst[..count].copy_from_slice(&chunk[..count]);
            Ok(count)
        }
    }

    fn manager(capacity: usize, fill_level: usize) -> RadarDataManager<Script> {
        RadarDataManager::with_config(Script::default(), &ManagerConfig::new(capacity, fill_level))
            .unwrap()
    }

    fn task(name: &str) -> ConsumerHandle {
        ConsumerHandle::task(name, TaskNotifier::new())
    }

    /// Allocator the test can still inspect after handing it to the manager.
    #[derive(Clone)]
    struct SharedAllocator(Arc<Mutex<BoundedAllocator>>);

    impl SharedAllocator {
        fn with_budget(budget: usize) -> Self {
            Self(Arc::new(Mutex::new(BoundedAllocator::with_budget(budget))))
        }

        fn in_use(&self) -> usize {
            self.0.lock().unwrap().in_use()
        }
    }

    impl BufferAllocator for SharedAllocator {
        fn allocate(&mut self, size: usize) -> RdmResult<Vec<u8>> {
            self.0.lock().unwrap().allocate(size)
        }

        fn release(&mut self, buffer: Vec<u8>) {
            self.0.lock().unwrap().release(buffer)
        }
    }

    fn assert_offsets_valid(mgr: &RadarDataManager<Script>) {
        let state = mgr.state();
        assert!(state.head <= state.tail);
        assert!(state.tail <= state.capacity);
        assert_eq!(state.buffered, state.tail - state.head);
    }

    #[test]
    fn single_subscriber_cycle_compacts_after_ack() {
        let mut mgr = manager(12, 4);
        let id = mgr.subscribe(task("main")).unwrap();

        mgr.producer_mut().feed(&[1, 2, 3, 4]);
        let report = mgr.run_from_isr().unwrap();
        assert_eq!(report.ingested, 4);
        assert_eq!(report.notified, 1);
        assert!(!report.compacted);
        assert_eq!(mgr.state().phase, CyclePhase::Notified);

        let window = mgr.read_from_buffer(id).unwrap();
        assert_eq!(window, &[1, 2, 3, 4]);
        assert_eq!(window.len(), 4);
        mgr.ack(id).unwrap();
        assert_eq!(mgr.state().phase, CyclePhase::Draining);

        let report = mgr.run_from_isr().unwrap();
        assert!(report.compacted);
        let state = mgr.state();
        assert_eq!((state.head, state.tail, state.buffered), (0, 0, 0));
        assert_eq!(state.phase, CyclePhase::Idle);
    }

    #[test]
    fn partial_acks_renotify_without_compacting() {
        let mut mgr = manager(12, 4);
        let first = mgr.subscribe(task("first")).unwrap();
        let second = mgr.subscribe(task("second")).unwrap();

        mgr.producer_mut().feed(&[1, 2, 3, 4]);
        assert_eq!(mgr.run().unwrap().notified, 2);
        mgr.ack(first).unwrap();
        assert!(mgr.is_acknowledged(first));
        assert!(!mgr.is_acknowledged(second));
        let head_before = mgr.state().head;

        mgr.producer_mut().feed(&[5, 6, 7]);
        let report = mgr.run().unwrap();
        assert_eq!(report.notified, 2);
        assert!(!report.compacted);
        assert_eq!(mgr.state().head, head_before);
        assert_eq!(mgr.state().tail, 7);

        mgr.ack(second).unwrap();
        assert!(mgr.run().unwrap().compacted);
        assert_eq!(&mgr.staged_bytes()[..3], &[5, 6, 7]);
        assert_eq!(mgr.state().tail, 3);
    }

    #[test]
    fn compaction_requires_every_occupied_slot() {
        let mut mgr = manager(16, 4);
        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| mgr.subscribe(task(name)).unwrap())
            .collect();
        mgr.producer_mut().feed(&[0; 4]);
        mgr.run().unwrap();

        for (acked, id) in ids.iter().enumerate() {
            assert!(!mgr.run().unwrap().compacted, "compacted after {} acks", acked);
            mgr.ack(*id).unwrap();
        }
        assert!(mgr.run().unwrap().compacted);
    }

    #[test]
    fn manager_without_subscribers_compacts_every_cycle() {
        let mut mgr = manager(12, 4);
        mgr.producer_mut().feed(&[1, 2, 3, 4, 5, 6, 7]);
        let report = mgr.run().unwrap();
        assert_eq!(report.notified, 0);
        assert!(report.compacted);
        assert_eq!(mgr.state().tail, 3);
        assert_eq!(&mgr.staged_bytes()[..3], &[5, 6, 7]);
    }

    #[test]
    fn unsubscribing_pending_subscriber_releases_window() {
        let mut mgr = manager(12, 4);
        let fast = mgr.subscribe(task("fast")).unwrap();
        let slow = mgr.subscribe(task("slow")).unwrap();
        mgr.producer_mut().feed(&[1, 2, 3, 4]);
        mgr.run().unwrap();
        mgr.ack(fast).unwrap();
        mgr.unsubscribe(slow);
        assert!(mgr.run().unwrap().compacted);
    }

    #[test]
    fn callback_subscribers_consume_synchronously() {
        let mut mgr = manager(12, 4);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        mgr.subscribe(ConsumerHandle::callback("cb", move |context, window| {
            assert_eq!(context, WakeContext::Interrupt);
            counter.fetch_add(window.iter().map(|&b| b as usize).sum(), Ordering::SeqCst);
        }))
        .unwrap();

        mgr.producer_mut().feed(&[1, 2, 3, 4, 9]);
        let report = mgr.run_from_isr().unwrap();
        assert!(report.compacted);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(mgr.state().tail, 1);
        assert_eq!(mgr.metrics().snapshot().interrupt_wakes, 1);
    }

    #[test]
    fn callback_sees_each_window_once_beside_slow_task() {
        let mut mgr = manager(12, 4);
        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let sink = deliveries.clone();
        mgr.subscribe(ConsumerHandle::callback("cb", move |_, window| {
            sink.lock().unwrap().push(window.to_vec());
        }))
        .unwrap();
        let slow = mgr.subscribe(task("slow")).unwrap();

        mgr.producer_mut().feed(&[1, 2, 3, 4]);
        assert_eq!(mgr.run().unwrap().notified, 2);
        assert_eq!(mgr.run().unwrap().notified, 1);
        mgr.ack(slow).unwrap();
        let report = mgr.run().unwrap();
        assert!(report.compacted);
        assert_eq!(report.notified, 1);
        assert_eq!(*deliveries.lock().unwrap(), vec![vec![1, 2, 3, 4]]);

        mgr.producer_mut().feed(&[5, 6, 7, 8]);
        assert_eq!(mgr.run().unwrap().notified, 2);
        assert_eq!(
            *deliveries.lock().unwrap(),
            vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]
        );
    }

    #[test]
    fn subscribe_beyond_capacity_fails() {
        let mut mgr = manager(12, 4);
        for n in 0..MAX_SUBSCRIBERS {
            let id = mgr.subscribe(task(&format!("consumer-{}", n))).unwrap();
            assert_eq!(id.get(), n + 1);
        }
        assert_eq!(
            mgr.subscribe(task("one-too-many")),
            Err(RdmError::CapacityExceeded(MAX_SUBSCRIBERS))
        );
    }

    #[test]
    fn resubscribe_is_idempotent() {
        let mut mgr = manager(12, 4);
        let handle = task("main");
        let id = mgr.subscribe(handle.clone()).unwrap();
        assert_eq!(mgr.subscribe(handle.clone()).unwrap(), id);
        assert_eq!(mgr.subscribers(), 1);
        assert_eq!(mgr.subscriber_name(id), Some("main"));
    }

    #[test]
    fn subscribe_requires_initialization() {
        let mut mgr = RadarDataManager::new(Script::default());
        assert_eq!(
            mgr.subscribe(task("main")),
            Err(RdmError::CapacityExceeded(MAX_SUBSCRIBERS))
        );
        assert!(matches!(mgr.subscribe(task("")), Err(RdmError::InvalidParam(_))));
    }

    #[test]
    fn lifecycle_rules() {
        let mut mgr = RadarDataManager::new(Script::default());
        assert!(matches!(mgr.init(8, 9), Err(RdmError::InvalidParam(_))));
        assert!(matches!(mgr.init(0, 0), Err(RdmError::InvalidParam(_))));
        assert!(matches!(mgr.deinit(), Err(RdmError::OperationBlocked(_))));
        assert!(matches!(mgr.run(), Err(RdmError::NotReady(_))));

        mgr.init(12, 4).unwrap();
        assert!(matches!(mgr.init(12, 4), Err(RdmError::OperationBlocked(_))));

        let id = mgr.subscribe(task("main")).unwrap();
        assert!(matches!(mgr.deinit(), Err(RdmError::OperationBlocked(_))));
        mgr.unsubscribe(id);
        mgr.deinit().unwrap();
        assert!(!mgr.is_initialized());
        mgr.init(6, 6).unwrap();
        assert_eq!(mgr.fill_level(), 6);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let mut mgr = RadarDataManager::new(Script::default());
        mgr.set_allocator(Box::new(BoundedAllocator::with_budget(8)));
        assert_eq!(mgr.init(12, 4), Err(RdmError::AllocationFailed(12)));
        assert!(!mgr.is_initialized());
        mgr.init(8, 4).unwrap();
    }

    #[test]
    fn allocator_swap_waits_for_deinit() {
        let old = SharedAllocator::with_budget(12);
        let new = SharedAllocator::with_budget(8);
        let mut mgr = RadarDataManager::new(Script::default());
        mgr.set_allocator(Box::new(old.clone()));
        mgr.init(12, 4).unwrap();
        assert_eq!(old.in_use(), 12);

        mgr.set_allocator(Box::new(new.clone()));
        assert_eq!(new.in_use(), 0);
        mgr.deinit().unwrap();
        assert_eq!(old.in_use(), 0);
        assert_eq!(new.in_use(), 0);

        mgr.init(8, 4).unwrap();
        assert_eq!(new.in_use(), 8);
        assert_eq!(old.in_use(), 0);
        mgr.deinit().unwrap();
        assert_eq!(new.in_use(), 0);
    }

    #[test]
    fn exhausted_staging_resets_on_run() {
        let mut mgr = manager(4, 4);
        mgr.subscribe(task("slow")).unwrap();
        mgr.producer_mut().feed(&[1, 2, 3, 4]);
        assert!(!mgr.run().unwrap().reset);

        if let Some(staging) = mgr.staging.as_mut() {
            staging.seek(4, 4);
        }
        let report = mgr.run().unwrap();
        assert!(report.reset);
        assert_eq!(report.notified, 0);
        assert!(mgr.staged_bytes().iter().all(|&b| b == 0));
        let state = mgr.state();
        assert_eq!((state.head, state.tail), (0, 0));
        assert_eq!(state.phase, CyclePhase::Idle);
        assert_eq!(mgr.metrics().snapshot().overflow_resets, 1);
    }

    #[test]
    fn read_from_buffer_validates_caller() {
        let mut mgr = manager(12, 4);
        let id = mgr.subscribe(task("main")).unwrap();
        assert!(matches!(mgr.read_from_buffer(id), Err(RdmError::NotReady(_))));

        mgr.producer_mut().feed(&[1, 2]);
        mgr.run().unwrap();
        assert!(matches!(mgr.read_from_buffer(id), Err(RdmError::NotReady(_))));

        mgr.producer_mut().feed(&[3, 4]);
        mgr.run().unwrap();
        assert!(mgr.read_from_buffer(id).is_ok());
        assert!(matches!(
            mgr.read_from_buffer(SubscriberId::new(0)),
            Err(RdmError::InvalidParam(_))
        ));
        assert!(matches!(
            mgr.read_from_buffer(SubscriberId::new(MAX_SUBSCRIBERS + 1)),
            Err(RdmError::InvalidParam(_))
        ));
        assert!(matches!(
            mgr.read_from_buffer(SubscriberId::new(2)),
            Err(RdmError::NotReady(_))
        ));
        assert!(matches!(
            mgr.ack(SubscriberId::new(MAX_SUBSCRIBERS + 1)),
            Err(RdmError::InvalidParam(_))
        ));
    }

    #[test]
    fn overreporting_producer_is_counted_and_dropped() {
        let mut mgr = manager(12, 4);
        mgr.producer_mut().overreport = Some(20);
        let report = mgr.run().unwrap();
        assert_eq!(
            report.anomaly,
            Some(IngestAnomaly {
                reported: 20,
                requested: 12
            })
        );
        assert_eq!(mgr.state().tail, 0);
        assert_eq!(mgr.metrics().snapshot().anomalies, 1);

        mgr.producer_mut().fail_next = true;
        assert!(mgr.run().unwrap().producer_failed);
        assert_eq!(mgr.metrics().snapshot().producer_errors, 1);
    }

    #[test]
    fn fill_level_bounds() {
        let mut mgr = manager(12, 4);
        assert!(mgr.set_fill_level(0).is_err());
        assert!(mgr.set_fill_level(13).is_err());
        mgr.set_fill_level(12).unwrap();
        assert_eq!(mgr.fill_level(), 12);

        let mut uninit = RadarDataManager::new(Script::default());
        assert!(uninit.set_fill_level(1).is_err());
        assert_eq!(uninit.fill_level(), 0);
    }

    #[test]
    fn run_is_bound_to_first_producer_thread() {
        let mut mgr = manager(12, 4);
        mgr.run().unwrap();
        let result = thread::scope(|scope| scope.spawn(|| mgr.run()).join().unwrap());
        assert!(matches!(result, Err(RdmError::OperationBlocked(_))));
        assert!(mgr.run().is_ok());
    }

    #[test]
    fn offsets_stay_valid_under_mixed_traffic() {
        let mut mgr = manager(32, 6);
        let a = mgr.subscribe(task("a")).unwrap();
        let b = mgr.subscribe(task("b")).unwrap();
        let mut seed: u32 = 0x2545_f491;

        for step in 0..500 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let len = (seed >> 24) as usize % 11;
            mgr.producer_mut().feed(&vec![step as u8; len]);
            mgr.run().unwrap();
            assert_offsets_valid(&mgr);

            if seed & 1 == 0 {
                let _ = mgr.ack(a);
            }
            if seed & 6 == 0 {
                let _ = mgr.ack(b);
            }
        }
        assert!(mgr.metrics().snapshot().compactions > 0);
    }
}
