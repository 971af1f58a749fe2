use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::builder::{DispatcherConfig, InFlightLimit};
use super::context::{Context, ProcessedCounter, ProcessedView};
use super::error::{DispatchError, DispatchResult, ProcessingError};
use super::handler::{ErrorPolicy, RecordHandler};
use super::record::Record;
use super::Queue::{relay_queue, RelayConsumer, RelayProducer, RelayWaker, Wait};
use crate::Core::backpressure::Gate;

/// Lifecycle of a dispatcher run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    /// No run started yet.
    Idle = 0,
    /// Worker running; the producer may hand over records.
    Running = 1,
    /// The stream has ended; the worker is draining.
    Ending = 2,
    /// The worker has returned. A new run may be started.
    Terminated = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Running,
            2 => Phase::Ending,
            3 => Phase::Terminated,
            _ => Phase::Idle,
        }
    }
}

/// State shared between the dispatcher, its worker and any [`DispatcherHandle`].
pub(crate) struct DispatchShared {
    pub(crate) phase: AtomicU8,
    pub(crate) processed: ProcessedCounter,
    pub(crate) gate: Gate,
    pub(crate) interrupted: AtomicBool,
    pub(crate) aborted: AtomicBool,
    pub(crate) worker_stopped: AtomicBool,
    /// Records dropped by `on_record` because the worker had already stopped.
    pub(crate) discarded: AtomicU64,
    /// Times the producer went to sleep on backpressure.
    pub(crate) backpressure_waits: AtomicU64,
    pub(crate) waker: Mutex<Option<RelayWaker<Record>>>,
}

impl DispatchShared {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Idle as u8),
            processed: ProcessedCounter::default(),
            gate: Gate::new(),
            interrupted: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            worker_stopped: AtomicBool::new(false),
            discarded: AtomicU64::new(0),
            backpressure_waits: AtomicU64::new(0),
            waker: Mutex::new(None),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn reset(&self) {
        self.processed.reset();
        self.interrupted.store(false, Ordering::SeqCst);
        self.aborted.store(false, Ordering::SeqCst);
        self.worker_stopped.store(false, Ordering::SeqCst);
        self.discarded.store(0, Ordering::Relaxed);
        self.backpressure_waits.store(0, Ordering::Relaxed);
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn worker_stopped(&self) -> bool {
        self.worker_stopped.load(Ordering::SeqCst)
    }
}

/// Cloneable, thread-safe view of a dispatcher.
///
/// Used to watch progress from outside the producer thread and to request the
/// two cancellation paths.
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<DispatchShared>,
}

impl DispatcherHandle {
    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Records handed to the handler so far in the current run.
    pub fn processed(&self) -> u64 {
        self.shared.processed.get()
    }

    pub fn backpressure_waits(&self) -> u64 {
        self.shared.backpressure_waits.load(Ordering::Relaxed)
    }

    /// Interrupts the producer.
    ///
    /// A producer blocked on backpressure wakes up, ends the stream and gets
    /// [`DispatchError::Interrupted`]; so does every later `on_record` in the
    /// run. Records already accepted are still drained by `on_end`.
    pub fn interrupt_producer(&self) {
        self.shared.interrupted.store(true, Ordering::SeqCst);
        self.shared.gate.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.shared.is_interrupted()
    }

    /// Aborts the worker.
    ///
    /// The worker stops before its next record without draining the queue, and
    /// `on_end` reports [`DispatchError::Aborted`].
    pub fn abort_worker(&self) {
        self.shared.aborted.store(true, Ordering::SeqCst);
        if let Some(waker) = self.shared.waker.lock().as_ref() {
            waker.wake();
        }
        self.shared.gate.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.is_aborted()
    }
}

enum WorkerFault {
    Failed(ProcessingError),
    Aborted,
}

/// What the worker thread hands back when it returns.
struct WorkerExit<H> {
    handler: H,
    outcome: Result<(), WorkerFault>,
}

struct Run<H> {
    producer: RelayProducer<Record>,
    worker: JoinHandle<WorkerExit<H>>,
}

enum State<H> {
    Idle(H),
    Running(Run<H>),
    /// The handler went down with a panicked worker.
    Lost,
}

/// Hands records from the producer thread to a single background worker that
/// feeds them, in order, to a [`RecordHandler`].
///
/// Drive it with [`Dispatcher::on_start`], any number of
/// [`Dispatcher::on_record`] calls and one [`Dispatcher::on_end`]. After a
/// successful `on_end` the dispatcher can be started again.
pub struct Dispatcher<H, C> {
    pub(crate) config: DispatcherConfig,
    state: State<H>,
    shared: Arc<DispatchShared>,
    _context: PhantomData<fn(&C)>,
}

impl<H, C> Dispatcher<H, C>
where
    H: RecordHandler<C>,
    C: Context + Clone,
{
    pub fn new(handler: H, config: DispatcherConfig) -> Self {
        Self {
            config,
            state: State::Idle(handler),
            shared: Arc::new(DispatchShared::new()),
            _context: PhantomData,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    pub fn limit(&self) -> InFlightLimit {
        self.config.limit
    }

    /// Records handed to the handler so far in the current run.
    pub fn processed(&self) -> u64 {
        self.shared.processed.get()
    }

    /// Records accepted but not yet fully handled by the worker.
    pub fn pending(&self) -> u64 {
        match &self.state {
            State::Running(run) => run.producer.pending(),
            _ => 0,
        }
    }

    /// The handler, when no run is in progress.
    pub fn handler(&self) -> Option<&H> {
        match &self.state {
            State::Idle(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn handler_mut(&mut self) -> Option<&mut H> {
        match &mut self.state {
            State::Idle(handler) => Some(handler),
            _ => None,
        }
    }

    /// Returns the handler, when no run is in progress.
    pub fn into_handler(mut self) -> Option<H> {
        match std::mem::replace(&mut self.state, State::Lost) {
            State::Idle(handler) => Some(handler),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Runs the handler's start hook on this thread, then starts the worker.
    pub fn on_start(&mut self, context: &C) -> DispatchResult<()> {
        let mut handler = match std::mem::replace(&mut self.state, State::Lost) {
            State::Idle(handler) => handler,
            State::Running(run) => {
                self.state = State::Running(run);
                return Err(DispatchError::AlreadyRunning);
            }
            State::Lost => return Err(DispatchError::HandlerLost),
        };

        if let Err(source) = handler.process_started(context) {
            self.state = State::Idle(handler);
            return Err(DispatchError::Hook {
                hook: "process_started",
                source,
            });
        }

        self.shared.reset();
        let (producer, consumer) = relay_queue::<Record>();
        *self.shared.waker.lock() = Some(producer.waker());

        let worker = Worker {
            consumer,
            view: ProcessedView::new(context.clone(), self.shared.processed.clone()),
            shared: self.shared.clone(),
            policy: self.config.error_policy.clone(),
            bounded: self.config.limit.is_bounded(),
            spin_limit: self.config.spin_limit,
        };

        // On spawn failure the closure, and the handler in it, is dropped
        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker.run(handler));

        match spawned {
            Ok(worker) => {
                self.shared.set_phase(Phase::Running);
                self.state = State::Running(Run { producer, worker });
                tracing::debug!(
                    limit = ?self.config.limit,
                    thread = %self.config.thread_name,
                    "relay worker started"
                );
                Ok(())
            }
            Err(err) => {
                *self.shared.waker.lock() = None;
                tracing::error!(error = %err, "failed to spawn relay worker");
                Err(DispatchError::Spawn(err))
            }
        }
    }

    /// Hands one record to the worker.
    ///
    /// With a bounded limit this blocks while the worker is `limit` records
    /// behind. Handler failures do not show up here; they are reported by
    /// [`Dispatcher::on_end`]. Once the worker has stopped, records are counted
    /// as undelivered and dropped.
    pub fn on_record(&mut self, record: Record, _context: &C) -> DispatchResult<()> {
        let State::Running(run) = &mut self.state else {
            return Err(DispatchError::NotRunning);
        };
        let shared = &self.shared;

        if shared.is_interrupted() {
            run.producer.close();
            return Err(DispatchError::Interrupted);
        }

        if let InFlightLimit::Bounded(limit) = self.config.limit {
            let producer = &run.producer;
            let parked = shared.gate.wait_while(|| {
                producer.pending() >= limit
                    && !shared.is_interrupted()
                    && !shared.worker_stopped()
            });
            if parked > 0 {
                shared.backpressure_waits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(parked, pending = producer.pending(), "producer resumed");
            }

            if shared.is_interrupted() {
                run.producer.close();
                tracing::debug!("producer interrupted on backpressure, ending stream");
                return Err(DispatchError::Interrupted);
            }
        }

        if shared.worker_stopped() {
            shared.discarded.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        if run.producer.append(record).is_err() {
            // Only an interrupt closes the stream before on_end
            return Err(DispatchError::Interrupted);
        }
        Ok(())
    }

    /// Ends the stream, waits for the worker to drain every accepted record,
    /// then runs the handler's end hook on this thread.
    ///
    /// A handler failure from any record is returned here.
    pub fn on_end(&mut self, context: &C) -> DispatchResult<()> {
        let run = match std::mem::replace(&mut self.state, State::Lost) {
            State::Running(run) => run,
            other => {
                self.state = other;
                return Err(DispatchError::NotRunning);
            }
        };

        self.shared.set_phase(Phase::Ending);
        let Run { producer, worker } = run;
        producer.close();
        self.shared.gate.notify_all();

        let joined = worker.join();
        let undelivered =
            producer.pending() + self.shared.discarded.load(Ordering::Relaxed);
        drop(producer);
        *self.shared.waker.lock() = None;
        self.shared.set_phase(Phase::Terminated);

        let WorkerExit {
            mut handler,
            outcome,
        } = match joined {
            Ok(exit) => exit,
            Err(_) => {
                tracing::error!("relay worker panicked");
                return Err(DispatchError::WorkerPanicked);
            }
        };

        let ended = handler.process_ended(context);
        self.state = State::Idle(handler);

        match outcome {
            Ok(()) => {}
            Err(WorkerFault::Failed(source)) => {
                tracing::error!(error = %source, undelivered, "relay run failed");
                return Err(DispatchError::Processing {
                    source,
                    undelivered,
                });
            }
            Err(WorkerFault::Aborted) => {
                tracing::warn!(undelivered, "relay run aborted");
                return Err(DispatchError::Aborted { undelivered });
            }
        }

        ended.map_err(|source| DispatchError::Hook {
            hook: "process_ended",
            source,
        })?;

        tracing::debug!(processed = self.processed(), "relay run finished");
        Ok(())
    }
}

impl<H, C> Drop for Dispatcher<H, C> {
    fn drop(&mut self) {
        if let State::Running(run) = std::mem::replace(&mut self.state, State::Lost) {
            // Dropping the producer ends the stream; the worker drains and exits
            drop(run.producer);
            self.shared.gate.notify_all();
            if run.worker.join().is_err() {
                tracing::warn!("relay worker panicked during drop");
            }
        }
    }
}

/// Marks the worker stopped and releases a producer parked on backpressure.
struct StopGuard<'a>(&'a DispatchShared);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_stopped.store(true, Ordering::SeqCst);
        self.0.gate.notify_all();
    }
}

/// Everything the worker thread owns besides the handler.
struct Worker<C> {
    consumer: RelayConsumer<Record>,
    view: ProcessedView<C>,
    shared: Arc<DispatchShared>,
    policy: Arc<dyn ErrorPolicy>,
    bounded: bool,
    spin_limit: u32,
}

impl<C: Context> Worker<C> {
    fn run<H: RecordHandler<C>>(mut self, mut handler: H) -> WorkerExit<H> {
        let span = tracing::debug_span!("relay_worker");
        let _entered = span.enter();

        // Released on every exit, unwinding included
        let shared = self.shared.clone();
        let _stopped = StopGuard(&shared);

        let outcome = self.drain(&mut handler);

        if let Err(WorkerFault::Aborted) = &outcome {
            tracing::debug!(left = self.consumer.pending(), "relay worker aborted");
        }
        WorkerExit { handler, outcome }
    }

    fn drain<H: RecordHandler<C>>(&mut self, handler: &mut H) -> Result<(), WorkerFault> {
        let shared = self.shared.clone();
        loop {
            match self
                .consumer
                .wait_for_record(self.spin_limit, || shared.is_aborted())
            {
                Wait::Ready => {}
                Wait::Closed => return Ok(()),
                Wait::Stopped => return Err(WorkerFault::Aborted),
            }

            let Some(record) = self.consumer.peek() else {
                continue;
            };
            let index = self.view.counter().increment();

            let policy = &self.policy;
            let handled = handler
                .record_processed(record, &self.view)
                .or_else(|error| policy.handle_error(error.at_record(index), record, index));

            self.consumer.advance();
            if self.bounded {
                self.shared.gate.notify();
            }

            if let Err(error) = handled {
                return Err(WorkerFault::Failed(error));
            }
        }
    }
}
