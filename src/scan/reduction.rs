use crate::errors::{PepSeekError, Result};
use crate::models::{GlobalPresence, PeptideSet, PresenceVector};

/// Folds per-worker presence vectors into one global OR.
///
/// Accepts vectors in any order. `finish` refuses to produce a result
/// unless every one of the `worker_count` partitions has been folded in.
#[derive(Debug)]
pub struct PresenceReducer {
    worker_count: usize,
    index_space: u64,
    flags: Vec<bool>,
    received: Vec<bool>,
}

impl PresenceReducer {
    pub fn new(peptides: &PeptideSet, worker_count: usize) -> Self {
        Self {
            worker_count,
            index_space: peptides.index_space(),
            flags: vec![false; peptides.len()],
            received: vec![false; worker_count],
        }
    }

    pub fn fold(&mut self, presence: PresenceVector) -> Result<()> {
        let task = presence.task();
        if task.worker_count() != self.worker_count {
            return Err(PepSeekError::ShapeMismatch {
                what: "worker count of presence vector",
                expected: self.worker_count,
                found: task.worker_count(),
            });
        }
        if presence.len() != self.flags.len() || presence.index_space() != self.index_space {
            return Err(PepSeekError::ShapeMismatch {
                what: "presence vector length",
                expected: self.flags.len(),
                found: presence.len(),
            });
        }
        let slot = task.worker_index() - 1;
        if self.received[slot] {
            return Err(PepSeekError::ShapeMismatch {
                what: "presence vectors received",
                expected: self.worker_count,
                found: self.received_count() + 1,
            });
        }
        self.received[slot] = true;

        for (global, &local) in self.flags.iter_mut().zip(presence.flags()) {
            *global |= local;
        }
        Ok(())
    }

    pub fn received_count(&self) -> usize {
        self.received.iter().filter(|&&x| x).count()
    }

    /// 1-based indices of the workers not folded in yet.
    pub fn missing_workers(&self) -> Vec<usize> {
        self.received
            .iter()
            .enumerate()
            .filter(|(_, &got)| !got)
            .map(|(i, _)| i + 1)
            .collect()
    }

    pub fn finish(self) -> Result<GlobalPresence> {
        let missing = self.missing_workers();
        if !missing.is_empty() {
            return Err(PepSeekError::PartialResult {
                expected: self.worker_count,
                received: self.worker_count - missing.len(),
                missing,
            });
        }
        Ok(GlobalPresence::new(self.index_space, self.flags))
    }
}

/// Reduces a complete batch of vectors in one call.
pub fn reduce_presence(
    peptides: &PeptideSet,
    worker_count: usize,
    vectors: Vec<PresenceVector>,
) -> Result<GlobalPresence> {
    if vectors.len() > worker_count {
        return Err(PepSeekError::ShapeMismatch {
            what: "presence vectors received",
            expected: worker_count,
            found: vectors.len(),
        });
    }
    let mut reducer = PresenceReducer::new(peptides, worker_count);
    for v in vectors {
        reducer.fold(v)?;
    }
    reducer.finish()
}
