// THEORY:
// The `ResultBuffer` is the dense, block-indexed output of the engine. Each
// slot belongs to exactly one block and may be written exactly once. Slots are
// disjoint, so workers never contend for the same entry; the only
// synchronization the engine needs is the join before the buffer is read.
//
// Empty slots are `None` rather than a zeroed record, so an aggregation over a
// partially populated buffer is detected instead of averaging in zeros.

use crate::core_modules::block_stats::BlockStats;
use crate::error::{Result, SsimError};

#[derive(Debug, Clone)]
pub struct ResultBuffer {
    slots: Vec<Option<BlockStats>>,
    written: usize,
}

impl ResultBuffer {
    pub fn new(block_count: usize) -> Self {
        Self {
            slots: vec![None; block_count],
            written: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stores the stats for block `index`. A slot can only be written once.
    pub fn write(&mut self, index: usize, stats: BlockStats) -> Result<()> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SsimError::SlotOutOfRange { index, len })?;
        if slot.is_some() {
            return Err(SsimError::SlotAlreadyWritten(index));
        }
        *slot = Some(stats);
        self.written += 1;
        Ok(())
    }

    /// Writes a contiguous run of blocks starting at `start`.
    pub fn write_run(&mut self, start: usize, run: Vec<BlockStats>) -> Result<()> {
        for (offset, stats) in run.into_iter().enumerate() {
            self.write(start + offset, stats)?;
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&BlockStats> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn is_complete(&self) -> bool {
        self.written == self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&BlockStats>> + '_ {
        self.slots.iter().map(Option::as_ref)
    }

    /// Unwraps every slot. Fails if any block was never written.
    pub fn into_stats(self) -> Result<Vec<BlockStats>> {
        if !self.is_complete() {
            return Err(SsimError::IncompleteResult {
                expected: self.slots.len(),
                written: self.written,
            });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}
