//! Ordered queues of deferred pool work

use crate::pool::PoolContents;
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// A unit of work that runs against the pool contents once its stream is
/// synchronized.
pub type Task = Box<dyn FnOnce(&mut PoolContents) + Send>;

/// Tasks submitted to one stream run in submission order.
///
/// Streams are created by the pool manager and share its count of
/// outstanding tasks. Dropping a stream discards the tasks that were never
/// synchronized.
pub struct Stream {
    tasks: VecDeque<Task>,
    pending: Arc<AtomicUsize>,
}

impl Stream {
    pub(crate) fn new(pending: Arc<AtomicUsize>) -> Stream {
        Stream {
            tasks: VecDeque::new(),
            pending,
        }
    }
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
    pub(crate) fn belongs_to(&self, pending: &Arc<AtomicUsize>) -> bool {
        Arc::ptr_eq(&self.pending, pending)
    }
    pub(crate) fn push(&mut self, task: Task) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tasks.push_back(task);
    }
    /// Run all tasks in order.
    pub(crate) fn drain(&mut self, contents: &mut PoolContents) -> usize {
        let mut executed = 0;
        while let Some(task) = self.tasks.pop_front() {
            task(contents);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            executed += 1;
        }
        executed
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.pending.fetch_sub(self.tasks.len(), Ordering::SeqCst);
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Stream({} pending)", self.tasks.len())
    }
}
