//! Two-level admission control (§4.1): a process-wide RPC-inflight
//! semaphore, and a per-file job manager that redistributes its cap as
//! sibling files finish.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds the number of `BulkUpsert` RPCs in flight across the whole
/// process (I1). Shared by every file's [`JobInflightManager`].
pub struct RpcInflight {
    semaphore: Semaphore,
    notified: std::sync::atomic::AtomicBool,
    max: u32,
}

impl RpcInflight {
    pub fn new(max_in_flight_requests: u32) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Semaphore::new(max_in_flight_requests as usize),
            notified: std::sync::atomic::AtomicBool::new(false),
            max: max_in_flight_requests,
        })
    }

    /// Acquire one RPC permit, logging the one-time "requests inflight"
    /// notice on first contention (§4.1).
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        if self.semaphore.available_permits() == 0
            && !self.notified.swap(true, Ordering::Relaxed)
        {
            tracing::info!(max_in_flight_requests = self.max, "RPC inflight limit reached");
        }
        self.semaphore
            .acquire()
            .await
            .expect("RpcInflight semaphore is never closed")
    }
}

/// Per-file job admission (§4.1, I-ORD invariant `max_job_inflight_total =
/// threads + max_in_flight_requests`). Every manager in a
/// [`JobInflightGroup`] starts with an equal share of that total (remainder
/// going to the lowest `order_num`s) and grows its share whenever a sibling
/// finishes, mirroring the original's `TJobInFlightManager`.
pub struct JobInflightManager {
    order_num: u32,
    semaphore: Arc<Semaphore>,
    current_cap: AtomicU32,
}

impl JobInflightManager {
    /// `order_num` is this manager's position (0-based) among the
    /// `file_count` files sharing `max_job_inflight_total` permits.
    fn new(order_num: u32, file_count: u32, max_job_inflight_total: u32) -> Self {
        let cap = share(max_job_inflight_total, file_count, order_num);
        Self {
            order_num,
            semaphore: Arc::new(Semaphore::new(cap as usize)),
            current_cap: AtomicU32::new(cap),
        }
    }

    pub fn current_cap(&self) -> u32 {
        self.current_cap.load(Ordering::SeqCst)
    }

    pub async fn acquire_job(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("job semaphore is never closed")
    }

    /// Grows this manager's cap to its equal share of
    /// `max_job_inflight_total` across the `remaining_files` still open.
    fn redistribute(&self, max_job_inflight_total: u32, remaining_files: u32) {
        let new_cap = share(max_job_inflight_total, remaining_files, self.order_num);
        let old_cap = self.current_cap.swap(new_cap, Ordering::SeqCst);
        if new_cap > old_cap {
            self.semaphore.add_permits((new_cap - old_cap) as usize);
        }
    }
}

/// Equal-share-with-remainder formula (spec.md:42/:61): `total / files`,
/// plus one for each of the first `total % files` managers by `order_num`.
fn share(total: u32, files: u32, order_num: u32) -> u32 {
    let files = files.max(1);
    (total / files + if order_num < total % files { 1 } else { 0 }).max(1)
}

/// Owns every [`JobInflightManager`] for the files in a run that take the
/// non-chunked CSV path (§4.4), and serializes the "a file finished, tell
/// its siblings" sequence the original guards with `inflightManagersLock`.
pub struct JobInflightGroup {
    max_job_inflight_total: u32,
    managers: Vec<Arc<JobInflightManager>>,
    state: Mutex<GroupState>,
}

struct GroupState {
    remaining_files: u32,
}

impl JobInflightGroup {
    /// `threads` is the run's worker thread count and `max_in_flight_requests`
    /// the process-wide RPC budget; together they form `max_job_inflight_total`
    /// (spec.md:42). `file_count` is how many files in this run take the
    /// non-chunked path.
    pub fn new(threads: u32, max_in_flight_requests: u32, file_count: u32) -> Arc<Self> {
        let max_job_inflight_total = threads + max_in_flight_requests;
        let file_count = file_count.max(1);
        let managers = (0..file_count)
            .map(|order_num| Arc::new(JobInflightManager::new(order_num, file_count, max_job_inflight_total)))
            .collect();
        Arc::new(Self {
            max_job_inflight_total,
            managers,
            state: Mutex::new(GroupState { remaining_files: file_count }),
        })
    }

    /// The manager this file should admit its batches through.
    pub fn manager(&self, order_num: usize) -> Arc<JobInflightManager> {
        self.managers[order_num].clone()
    }

    /// Called once a file finishes reading: drops the group's count of open
    /// files and grows every remaining manager's cap by its new equal share.
    pub fn finish(&self, order_num: usize) {
        let remaining_files = {
            let mut state = self.state.lock().expect("JobInflightGroup poisoned");
            state.remaining_files = state.remaining_files.saturating_sub(1).max(1);
            state.remaining_files
        };
        for (i, mgr) in self.managers.iter().enumerate() {
            if i != order_num {
                mgr.redistribute(self.max_job_inflight_total, remaining_files);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_splits_evenly_with_remainder_to_lowest_order() {
        let caps: Vec<u32> = (0..3).map(|i| share(10, 3, i)).collect();
        assert_eq!(caps, vec![4, 3, 3]);
        assert_eq!(caps.iter().sum::<u32>(), 10);
    }

    #[tokio::test]
    async fn group_cap_starts_as_equal_share_of_threads_plus_inflight() {
        let group = JobInflightGroup::new(4, 100, 4);
        // max_job_inflight_total = threads(4) + max_in_flight_requests(100) = 104
        assert_eq!(group.manager(0).current_cap(), 26);
        assert_eq!(group.manager(1).current_cap(), 26);
    }

    #[tokio::test]
    async fn cap_grows_when_sibling_finishes() {
        let group = JobInflightGroup::new(0, 100, 2);
        assert_eq!(group.manager(0).current_cap(), 50);
        assert_eq!(group.manager(1).current_cap(), 50);

        group.finish(1);

        assert_eq!(group.manager(0).current_cap(), 100);
    }

    #[tokio::test]
    async fn redistribution_preserves_remainder_ordering() {
        let group = JobInflightGroup::new(0, 10, 3);
        assert_eq!(group.manager(0).current_cap(), 4);
        assert_eq!(group.manager(1).current_cap(), 3);
        assert_eq!(group.manager(2).current_cap(), 3);

        group.finish(2);

        assert_eq!(group.manager(0).current_cap(), 5);
        assert_eq!(group.manager(1).current_cap(), 5);
    }
}
