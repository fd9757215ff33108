use crate::models::PartitionTask;

/// Striped assignment of 1-based record ordinals to 1-based workers.
///
/// `(ordinal - worker_index) mod worker_count == 0`. For a fixed
/// `worker_count` each ordinal lands on exactly one worker. With no workers
/// nothing is owned.
pub fn belongs_to_partition(record_ordinal: u64, worker_count: usize, worker_index: usize) -> bool {
    if worker_count == 0 {
        return false;
    }
    let w = worker_count as i128;
    (record_ordinal as i128 - worker_index as i128).rem_euclid(w) == 0
}

impl PartitionTask {
    pub fn owns(&self, record_ordinal: u64) -> bool {
        belongs_to_partition(record_ordinal, self.worker_count(), self.worker_index())
    }
}
