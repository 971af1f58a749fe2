use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64};
use std::sync::Arc;

use crossbeam_utils::{Backoff, CachePadded};

use super::Queue::{Node, RelayConsumer, RelayProducer, RelayWaker, Shared, Wait};
use crate::Core::futex::Signal;

/// Creates an empty relay queue and returns its two halves.
///
/// The queue is unbounded; any in-flight limit is enforced by the caller on top
/// of [`RelayProducer::pending`].
pub fn relay_queue<T>() -> (RelayProducer<T>, RelayConsumer<T>) {
    let sentinel = Node::alloc(None);
    let shared = Arc::new(Shared {
        head: AtomicPtr::new(sentinel),
        input: CachePadded::new(AtomicU64::new(0)),
        output: CachePadded::new(AtomicU64::new(0)),
        closed: AtomicBool::new(false),
        signal: Signal::new(),
        _marker: PhantomData,
    });

    (
        RelayProducer {
            tail: sentinel,
            shared: shared.clone(),
        },
        RelayConsumer {
            head: sentinel,
            shared,
        },
    )
}

impl<T> Node<T> {
    pub(crate) fn alloc(record: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            record: UnsafeCell::new(record),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

impl<T> Shared<T> {
    #[inline]
    fn pending(&self) -> u64 {
        let output = self.output.load(Acquire);
        let input = self.input.load(Acquire);
        input.saturating_sub(output)
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Both halves are gone, so nobody else can touch the chain.
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next.load(Relaxed);
        }
    }
}

impl<T> RelayProducer<T> {
    /// Appends a record at the tail.
    ///
    /// Never blocks. Returns the record back if the stream was already closed.
    pub fn append(&mut self, record: T) -> Result<(), T> {
        if self.shared.closed.load(Acquire) {
            return Err(record);
        }

        let node = Node::alloc(Some(record));

        // Count before publishing so the consumer can never get ahead of `input`
        self.shared.input.fetch_add(1, Release);

        // Publish: the node is fully built before the consumer can see it
        unsafe { (*self.tail).next.store(node, Release) };
        self.tail = node;

        self.shared.signal.notify_if_parked();
        Ok(())
    }

    /// Ends the stream and wakes the consumer. Further appends are rejected.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, SeqCst) {
            self.shared.signal.notify();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Acquire)
    }

    /// Records appended but not yet advanced past by the consumer.
    pub fn pending(&self) -> u64 {
        self.shared.pending()
    }

    pub fn input_count(&self) -> u64 {
        self.shared.input.load(Acquire)
    }

    pub fn output_count(&self) -> u64 {
        self.shared.output.load(Acquire)
    }

    /// Returns a handle that can wake the consumer from another thread.
    pub fn waker(&self) -> RelayWaker<T> {
        RelayWaker {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for RelayProducer<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> RelayConsumer<T> {
    #[inline]
    fn next_node(&self) -> *mut Node<T> {
        unsafe { (*self.head).next.load(Acquire) }
    }

    /// Returns the record at the head, if the producer has linked one.
    pub fn peek(&self) -> Option<&T> {
        let next = self.next_node();
        if next.is_null() {
            return None;
        }
        // Only this consumer ever touches a linked node's record slot
        unsafe { (*(*next).record.get()).as_ref() }
    }

    /// Moves the head past the current record and returns it.
    ///
    /// Returns `None` if the producer has not linked a next node yet.
    pub fn advance(&mut self) -> Option<T> {
        let next = self.next_node();
        if next.is_null() {
            return None;
        }

        let record = unsafe { (*(*next).record.get()).take() };
        let old = std::mem::replace(&mut self.head, next);
        self.shared.head.store(next, Relaxed);

        // The producer's tail is at or past `next`, so it never touches `old` again
        unsafe { drop(Box::from_raw(old)) };

        self.shared.output.fetch_add(1, Release);
        record
    }

    /// True once the stream has ended and no record remains at the head.
    pub fn is_empty_and_closed(&self) -> bool {
        // Read the flag first: everything appended before close is then visible
        self.shared.closed.load(SeqCst) && self.next_node().is_null()
    }

    /// Waits until a record is available, the stream is drained and closed, or
    /// `stop` returns true.
    ///
    /// Spins with backoff for up to `spin_limit` rounds, then parks until the
    /// producer publishes a record or closes the stream. `stop` is checked first
    /// on every round, so it wins over pending records; a caller that sets the
    /// condition from another thread must wake the consumer with a [`RelayWaker`].
    pub fn wait_for_record<F>(&self, spin_limit: u32, stop: F) -> Wait
    where
        F: Fn() -> bool,
    {
        let backoff = Backoff::new();
        let mut rounds = 0u32;

        loop {
            if stop() {
                return Wait::Stopped;
            }
            if !self.next_node().is_null() {
                return Wait::Ready;
            }
            if self.is_empty_and_closed() {
                return Wait::Closed;
            }
            // Closed between the two loads above; the record check decides
            if self.shared.closed.load(SeqCst) {
                continue;
            }

            if rounds < spin_limit {
                rounds += 1;
                backoff.snooze();
                continue;
            }

            let seen = self.shared.signal.prepare();
            if stop() || !self.next_node().is_null() || self.shared.closed.load(SeqCst) {
                self.shared.signal.cancel();
                continue;
            }
            tracing::trace!(pending = self.pending(), "relay consumer parking");
            self.shared.signal.park(seen);
        }
    }

    pub fn pending(&self) -> u64 {
        self.shared.pending()
    }

    pub fn input_count(&self) -> u64 {
        self.shared.input.load(Acquire)
    }

    pub fn output_count(&self) -> u64 {
        self.shared.output.load(Acquire)
    }
}

impl<T> RelayWaker<T> {
    /// Wakes the consumer so it re-evaluates its stop condition.
    pub fn wake(&self) {
        self.shared.signal.notify();
    }
}

impl<T> Clone for RelayWaker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}
