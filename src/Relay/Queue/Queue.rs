// Append-only linked relay between the producer and the relay worker

use crate::Core::futex::Signal;
use crossbeam_utils::CachePadded;

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64};
use std::sync::Arc;

/// One link in the relay chain.
///
/// The record slot is written once by the producer before the node is linked and
/// taken once by the consumer when it advances onto the node. The forward link is
/// written exactly once, by the producer, with release ordering.
pub(crate) struct Node<T> {
    pub(crate) record: UnsafeCell<Option<T>>,
    pub(crate) next: AtomicPtr<Node<T>>,
}

/// State shared by both halves of a relay queue.
///
/// ### Concurrency Design:
/// - **Producer**: owns the tail pointer, bumps `input` and then publishes the
///   new node through the tail's `next` link.
/// - **Consumer**: owns the head pointer. The head is always a sentinel whose
///   record has already been consumed; the record "at the head" is the one in
///   `head.next`. Advancing frees the old sentinel and bumps `output`.
///
/// Because every record is counted in `input` before it becomes reachable,
/// `output <= input` holds for any reader.
pub(crate) struct Shared<T> {
    /// Mirror of the consumer's sentinel, used to free the chain on drop.
    pub(crate) head: AtomicPtr<Node<T>>,

    /// Records appended. Written only by the producer.
    pub(crate) input: CachePadded<AtomicU64>,

    /// Records advanced past. Written only by the consumer.
    pub(crate) output: CachePadded<AtomicU64>,

    /// Set once the producer has ended the stream.
    pub(crate) closed: AtomicBool,

    /// Wake-up word the consumer parks on when the chain runs dry.
    pub(crate) signal: Signal,

    pub(crate) _marker: PhantomData<T>,
}

/// Producer half of a relay queue. Appends records at the tail.
///
/// Dropping the producer ends the stream.
pub struct RelayProducer<T> {
    pub(crate) tail: *mut Node<T>,
    pub(crate) shared: Arc<Shared<T>>,
}

/// Consumer half of a relay queue. Reads and advances from the head.
pub struct RelayConsumer<T> {
    pub(crate) head: *mut Node<T>,
    pub(crate) shared: Arc<Shared<T>>,
}

/// Handle that can wake a parked consumer from any thread without touching records.
pub struct RelayWaker<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

/// Why [`RelayConsumer::wait_for_record`] returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wait {
    /// A record is available at the head.
    Ready,
    /// The stream ended and every record has been consumed.
    Closed,
    /// The caller's stop condition became true.
    Stopped,
}

unsafe impl<T: Send> Send for RelayProducer<T> {}
unsafe impl<T: Send> Send for RelayConsumer<T> {}
unsafe impl<T: Send> Send for RelayWaker<T> {}
unsafe impl<T: Send> Sync for RelayWaker<T> {}
