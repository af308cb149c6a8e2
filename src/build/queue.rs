//! Per-worker work queues.
//!
//! Each compile worker owns one [`BuildJob`]: a growable ring buffer behind a
//! mutex plus two flags. The main thread fills the queues round-robin, then
//! raises `all_queued`; a worker exits once it has seen `all_queued` and found
//! its queue empty, raising `all_complete` on the way out.

use crate::error::BuildResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const INITIAL_CAPACITY: usize = 100;

/// Bounded FIFO ring that doubles when full.
#[derive(Debug)]
pub struct RingQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

impl<T> RingQueue<T> {
    pub fn with_capacity(capacity: usize) -> BuildResult<Self> {
        let capacity = capacity.max(1);
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots,
            head: 0,
            tail: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        (self.tail + self.capacity() - self.head) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn push(&mut self, item: T) -> BuildResult<()> {
        if (self.tail + 1) % self.capacity() == self.head {
            self.grow()?;
        }
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        item
    }

    /// Forget every queued item.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
    }

    // Double the ring. A wrapped run [head, cap) moves to the top of the new
    // buffer so the items stay in order.
    fn grow(&mut self) -> BuildResult<()> {
        let old = self.capacity();
        self.slots.try_reserve_exact(old)?;
        self.slots.resize_with(old * 2, || None);

        if self.tail < self.head {
            for i in (self.head..old).rev() {
                self.slots.swap(i, i + old);
            }
            self.head += old;
        }
        Ok(())
    }
}

/// One worker's queue and its termination flags.
#[derive(Debug)]
pub struct BuildJob<T> {
    queue: Mutex<RingQueue<T>>,
    all_queued: AtomicBool,
    all_complete: AtomicBool,
}

impl<T> BuildJob<T> {
    pub fn new() -> BuildResult<Self> {
        Ok(Self {
            queue: Mutex::new(RingQueue::with_capacity(INITIAL_CAPACITY)?),
            all_queued: AtomicBool::new(false),
            all_complete: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RingQueue<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: T) -> BuildResult<()> {
        self.lock().push(item)
    }

    pub fn pop(&self) -> Option<T> {
        self.lock().pop()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn mark_all_queued(&self) {
        self.all_queued.store(true, Ordering::Release);
    }

    pub fn all_queued(&self) -> bool {
        self.all_queued.load(Ordering::Acquire)
    }

    pub fn mark_all_complete(&self) {
        self.all_complete.store(true, Ordering::Release);
    }

    pub fn all_complete(&self) -> bool {
        self.all_complete.load(Ordering::Acquire)
    }

    /// Empty the queue and lower both flags for the next step.
    pub fn reset(&self) {
        self.lock().reset();
        self.all_queued.store(false, Ordering::Release);
        self.all_complete.store(false, Ordering::Release);
    }
}

/// One [`BuildJob`] per worker.
#[derive(Debug)]
pub struct WorkQueueSet<T> {
    jobs: Vec<BuildJob<T>>,
}

impl<T> WorkQueueSet<T> {
    pub fn new(workers: usize) -> BuildResult<Self> {
        let jobs = (0..workers.max(1))
            .map(|_| BuildJob::new())
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Self { jobs })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[BuildJob<T>] {
        &self.jobs
    }

    pub fn reset(&self) {
        self.jobs.iter().for_each(BuildJob::reset);
    }

    /// Hand item `i` to queue `i mod workers`.
    pub fn distribute<I>(&self, items: I) -> BuildResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self.jobs[i % self.jobs.len()].push(item)?;
        }
        Ok(())
    }

    pub fn mark_all_queued(&self) {
        self.jobs.iter().for_each(BuildJob::mark_all_queued);
    }
}
