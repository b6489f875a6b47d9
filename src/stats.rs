//! Per-branch statistics collected alongside the run-wide counters.

use std::collections::BTreeMap;

use bitvec::prelude::*;
use itertools::Itertools;

use crate::branch::InstRecord;
use crate::sim::Prediction;

/// Per-branch bookkeeping, keyed by program counter value.
///
/// This is optional instrumentation layered over the simulation: the
/// caller feeds it control-flow records and their scored predictions.
pub struct BranchStats {
    /// Per-branch statistics (indexed by program counter value).
    pub data: BTreeMap<usize, BranchData>,
}
impl BranchStats {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    /// Record one executed control-flow instruction.
    pub fn update(&mut self, record: &InstRecord, pred: &Prediction) {
        let data = self.get_mut(record.pc);
        data.occ += 1;
        data.pat.push(record.outcome().into());
        if pred.dir_ok && pred.tgt_ok {
            data.hits += 1;
        }
    }

    /// Returns a reference to data collected for a particular branch.
    pub fn get(&self, pc: usize) -> Option<&BranchData> {
        self.data.get(&pc)
    }

    /// Returns a mutable reference to data collected for a particular
    /// branch, creating a new entry if one doesn't already exist.
    pub fn get_mut(&mut self, pc: usize) -> &mut BranchData {
        self.data.entry(pc).or_insert_with(BranchData::new)
    }

    /// Returns the number of unique observed branch instructions.
    pub fn num_unique_branches(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of branches that are always taken.
    pub fn num_always_taken(&self) -> usize {
        self.data.values().filter(|d| d.is_always_taken()).count()
    }

    /// Returns the number of branches that are never taken.
    pub fn num_never_taken(&self) -> usize {
        self.data.values().filter(|d| d.is_never_taken()).count()
    }

    /// The `n` most frequently executed branches, most common first.
    pub fn get_common_branches(&self, n: usize) -> Vec<(usize, &BranchData)> {
        self.data
            .iter()
            .sorted_by(|x, y| x.1.occ.cmp(&y.1.occ))
            .rev()
            .take(n)
            .map(|(pc, d)| (*pc, d))
            .collect()
    }
}

impl Default for BranchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Container for per-branch statistics.
pub struct BranchData {
    /// Number of times this branch was executed.
    pub occ: usize,

    /// Number of fully correct predictions for this branch.
    pub hits: usize,

    /// Record of all observed outcomes for this branch.
    pub pat: BitVec,
}
impl BranchData {
    pub fn new() -> Self {
        Self {
            occ: 0,
            hits: 0,
            pat: BitVec::new(),
        }
    }

    /// Return the fully-correct prediction rate for this branch.
    pub fn hit_rate(&self) -> f64 {
        self.hits as f64 / self.occ as f64
    }

    pub fn is_always_taken(&self) -> bool {
        self.pat.count_ones() == self.pat.len()
    }

    pub fn is_never_taken(&self) -> bool {
        self.pat.count_zeros() == self.pat.len()
    }

    pub fn times_taken(&self) -> usize {
        self.pat.count_ones()
    }
}

impl Default for BranchData {
    fn default() -> Self {
        Self::new()
    }
}
