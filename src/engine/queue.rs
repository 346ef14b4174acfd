// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::errors::{BakedagError, Result};
use crate::types::QueueKind;

/// Anything that can travel through a [`BoundedQueue`].
pub trait QueueItem: Send {
    /// Higher values leave a priority queue first.
    fn priority(&self) -> i32 {
        0
    }
}

/// Ordering policy of a queue. `seq` is a strictly increasing insertion
/// counter supplied by the queue.
pub trait Discipline<T>: Send {
    fn push(&mut self, item: T, priority: i32, seq: u64);
    fn pop(&mut self) -> Option<T>;
    fn len(&self) -> usize;
}

/// First in, first out.
pub struct FifoDiscipline<T> {
    items: VecDeque<T>,
}

impl<T> FifoDiscipline<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> Default for FifoDiscipline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Discipline<T> for FifoDiscipline<T> {
    fn push(&mut self, item: T, _priority: i32, _seq: u64) {
        self.items.push_back(item);
    }

    fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Highest priority first; equal priorities leave in insertion order.
pub struct PriorityDiscipline<T> {
    heap: BinaryHeap<Ranked<T>>,
}

impl<T> PriorityDiscipline<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl<T> Default for PriorityDiscipline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Discipline<T> for PriorityDiscipline<T> {
    fn push(&mut self, item: T, priority: i32, seq: u64) {
        self.heap.push(Ranked {
            priority,
            seq,
            item,
        });
    }

    fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|r| r.item)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Heap entry ordered by `(priority, earlier seq)`; the item never takes
/// part in comparisons.
struct Ranked<T> {
    priority: i32,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner<T> {
    discipline: Box<dyn Discipline<T>>,
    next_seq: u64,
    closed: bool,
}

/// Bounded, thread-safe queue shared between the scheduler and the executor.
///
/// - `put` waits while the queue is full, `pop` waits while it is empty.
/// - `close` posts a sticky sentinel: consumers drain what is left and then
///   every `pop` returns `None` immediately.
///
/// Internally `items` holds one permit per queued item plus one for the
/// sentinel once closed; `slots` holds one permit per free place.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    items: Semaphore,
    slots: Semaphore,
    capacity: usize,
    kind: QueueKind,
}

impl<T: QueueItem + 'static> BoundedQueue<T> {
    /// Create a queue of the given discipline. `capacity` is clamped to at
    /// least 1.
    pub fn new(kind: QueueKind, capacity: usize) -> Self {
        let discipline: Box<dyn Discipline<T>> = match kind {
            QueueKind::Fifo => Box::new(FifoDiscipline::new()),
            QueueKind::Priority => Box::new(PriorityDiscipline::new()),
        };
        Self::with_discipline(kind, discipline, capacity)
    }

    pub fn fifo(capacity: usize) -> Self {
        Self::new(QueueKind::Fifo, capacity)
    }

    pub fn priority(capacity: usize) -> Self {
        Self::new(QueueKind::Priority, capacity)
    }

    fn with_discipline(kind: QueueKind, discipline: Box<dyn Discipline<T>>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                discipline,
                next_seq: 0,
                closed: false,
            }),
            items: Semaphore::new(0),
            slots: Semaphore::new(capacity),
            capacity,
            kind,
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue an item, waiting for a free slot. Fails once the queue is closed.
    pub async fn put(&self, item: T) -> Result<()> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| BakedagError::QueueClosed)?;
        permit.forget();
        self.push_reserved(item).map_err(|_| BakedagError::QueueClosed)
    }

    /// Enqueue without waiting. Gives the item back when the queue is full
    /// or closed.
    pub fn try_put(&self, item: T) -> std::result::Result<(), T> {
        match self.slots.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.push_reserved(item)
            }
            Err(_) => Err(item),
        }
    }

    /// Push an item for which a slot permit was already taken.
    fn push_reserved(&self, item: T) -> std::result::Result<(), T> {
        {
            let mut inner = self.lock();
            if inner.closed {
                drop(inner);
                self.slots.add_permits(1);
                return Err(item);
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let priority = item.priority();
            inner.discipline.push(item, priority, seq);
            trace!(seq, priority, queued = inner.discipline.len(), "item enqueued");
        }
        self.items.add_permits(1);
        Ok(())
    }

    /// Dequeue the next item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        let permit = self.items.acquire().await.ok()?;
        let popped = self.lock().discipline.pop();
        match popped {
            Some(item) => {
                permit.forget();
                self.slots.add_permits(1);
                Some(item)
            }
            None => {
                // Only the sentinel is left: hand its permit back so every
                // other consumer observes it too.
                drop(permit);
                debug!("queue closed and drained");
                None
            }
        }
    }

    /// Signal that no more items will be put.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        drop(inner);
        self.slots.close();
        self.items.add_permits(1);
        debug!(kind = ?self.kind, "queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Advisory number of queued items.
    pub fn len(&self) -> usize {
        self.lock().discipline.len()
    }

    /// Advisory emptiness check.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
