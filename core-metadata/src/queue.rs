//! FIFO of pending scan jobs. The head is the job wired into the probe
//! pipeline, if any.

use crate::job::{ScanJob, ScanJobId};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct ScanQueue {
    jobs: VecDeque<ScanJob>,
    next_id: u64,
}

impl Default for ScanQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanQueue {
    pub fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Append a job for `uri` and return its id. Ids are never reused.
    pub fn push(&mut self, uri: impl Into<String>) -> ScanJobId {
        let id = ScanJobId::new(self.next_id);
        self.next_id += 1;
        self.jobs.push_back(ScanJob::new(id, uri));
        id
    }

    pub fn head(&self) -> Option<&ScanJob> {
        self.jobs.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut ScanJob> {
        self.jobs.front_mut()
    }

    pub fn is_head(&self, id: ScanJobId) -> bool {
        self.head().map(ScanJob::id) == Some(id)
    }

    pub fn pop(&mut self) -> Option<ScanJob> {
        self.jobs.pop_front()
    }

    /// Remove a job by id, preserving the order of the others.
    pub fn remove(&mut self, id: ScanJobId) -> Option<ScanJob> {
        let index = self.jobs.iter().position(|job| job.id() == id)?;
        self.jobs.remove(index)
    }

    pub fn contains(&self, id: ScanJobId) -> bool {
        self.jobs.iter().any(|job| job.id() == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids in queue order.
    pub fn ids(&self) -> impl Iterator<Item = ScanJobId> + '_ {
        self.jobs.iter().map(ScanJob::id)
    }

    /// Drop every job, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }
}
