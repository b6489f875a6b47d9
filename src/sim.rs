//! The per-instruction predict/score/update loop.

use log::debug;

use crate::branch::{InstRecord, Outcome};
use crate::config::{BpuConfig, ConfigError};
use crate::predictor::{DirectionPredictor, ReturnAddressStack, SetAssocBtb};

/// The scored prediction for a single instruction.
///
/// Derived per event and not persisted; the run-wide totals live in
/// [`SimCounters`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prediction {
    /// Predicted direction
    pub dir: Outcome,
    /// Predicted next program counter value
    pub tgt: usize,
    /// Whether the predicted direction matched the actual outcome
    pub dir_ok: bool,
    /// Whether the predicted target matched the actual next instruction
    pub tgt_ok: bool,
}

/// Monotone run-wide totals, read out once at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimCounters {
    /// Instructions seen (control flow or not)
    pub instructions: u64,
    /// Control-flow instructions seen
    pub branches: u64,
    /// Control-flow instructions that were actually taken
    pub taken: u64,
    /// Branches whose direction was predicted correctly
    pub correct_dir: u64,
    /// Branches whose target was predicted correctly
    pub correct_tgt: u64,
    /// Branches with both direction and target correct
    pub correct_full: u64,
}
impl SimCounters {
    /// Percentage of `count` over all branches. An empty run reports 0
    /// rather than dividing by zero.
    fn pct_of_branches(&self, count: u64) -> f64 {
        if self.branches == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.branches as f64
        }
    }

    pub fn taken_pct(&self) -> f64 {
        self.pct_of_branches(self.taken)
    }
    pub fn correct_dir_pct(&self) -> f64 {
        self.pct_of_branches(self.correct_dir)
    }
    pub fn correct_tgt_pct(&self) -> f64 {
        self.pct_of_branches(self.correct_tgt)
    }
    pub fn correct_full_pct(&self) -> f64 {
        self.pct_of_branches(self.correct_full)
    }
}

impl std::fmt::Display for SimCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Instructions: {}", self.instructions)?;
        writeln!(f, "Branches: {}", self.branches)?;
        writeln!(f, " taken: {} ({:.2}%)", self.taken, self.taken_pct())?;
        writeln!(
            f,
            " Predicted (direction & target): {} ({:.2}%)",
            self.correct_full,
            self.correct_full_pct()
        )?;
        writeln!(
            f,
            " Predicted direction: {} ({:.2}%)",
            self.correct_dir,
            self.correct_dir_pct()
        )?;
        writeln!(
            f,
            " Predicted target: {} ({:.2}%)",
            self.correct_tgt,
            self.correct_tgt_pct()
        )
    }
}

/// A branch prediction unit: direction predictor, BTB, RAS, and the
/// counters they feed.
///
/// One instance owns all predictor state; there are no process-wide
/// globals, so independent units can run side by side in tests.
pub struct Bpu {
    direction: DirectionPredictor,
    btb: SetAssocBtb,
    ras: ReturnAddressStack,
    counters: SimCounters,
    calls: u64,
    returns: u64,
    returns_correct_tgt: u64,
}
impl Bpu {
    pub fn new(cfg: &BpuConfig) -> Result<Self, ConfigError> {
        Self::build(cfg, DirectionPredictor::new(cfg.mispredict_rate))
    }

    /// Build a unit whose direction noise is deterministic.
    pub fn with_seed(cfg: &BpuConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::build(cfg, DirectionPredictor::with_seed(cfg.mispredict_rate, seed))
    }

    fn build(cfg: &BpuConfig, direction: DirectionPredictor) -> Result<Self, ConfigError> {
        cfg.validate()?;
        debug!(
            "BPU: {} BTB entries ({} sets x {}-way, {}-bit tags), {} RAS entries, {}% noise",
            cfg.btb_capacity,
            cfg.num_sets(),
            cfg.btb_assoc,
            cfg.tag_bits,
            cfg.ras_capacity,
            cfg.mispredict_rate
        );
        Ok(Self {
            direction,
            btb: SetAssocBtb::new(cfg.btb_capacity, cfg.btb_assoc, cfg.tag_bits),
            ras: ReturnAddressStack::new(cfg.ras_capacity),
            counters: SimCounters::default(),
            calls: 0,
            returns: 0,
            returns_correct_tgt: 0,
        })
    }

    pub fn counters(&self) -> &SimCounters {
        &self.counters
    }

    /// Predict, score, and train on one executed instruction.
    ///
    /// Everything the prediction uses is known at fetch time; the actual
    /// outcome is consulted only for scoring and for the commit-time
    /// update.
    pub fn process(&mut self, record: &InstRecord) -> Prediction {
        let fallthrough = record.fallthrough();
        let outcome = record.outcome();

        // Fetch: guess a direction, then a target.
        let dir = self
            .direction
            .predict(record.is_control_flow(), outcome);
        let tgt = self.predict_target(record.pc, fallthrough, dir);

        // Score against what actually executed.
        let dir_ok = dir == outcome;
        let tgt_ok = match outcome {
            Outcome::T => tgt == record.tgt,
            Outcome::N => tgt == fallthrough,
        };

        self.counters.instructions += 1;
        if record.is_control_flow() {
            self.counters.branches += 1;
            if outcome == Outcome::T {
                self.counters.taken += 1;
            }
            if dir_ok {
                self.counters.correct_dir += 1;
            }
            if tgt_ok {
                self.counters.correct_tgt += 1;
            }
            if dir_ok && tgt_ok {
                self.counters.correct_full += 1;
            }
        }

        // Commit: calls bank their return address whether or not the
        // record is control-flow-tagged; the BTB trains only on taken,
        // target-mispredicted control flow.
        if record.is_call() {
            self.calls += 1;
            self.ras.push(fallthrough);
        }
        if record.is_control_flow() {
            if record.is_return() {
                self.returns += 1;
                if tgt_ok {
                    self.returns_correct_tgt += 1;
                }
            }
            if outcome == Outcome::T && !tgt_ok {
                self.btb.update(record.pc, record.tgt, record.is_return());
            }
        }

        Prediction {
            dir,
            tgt,
            dir_ok,
            tgt_ok,
        }
    }

    /// Resolve the predicted target for `pc` given a predicted direction.
    ///
    /// A BTB hit flagged as a return always takes its target from the
    /// RAS, never from the entry's stored target field; that pop is the
    /// only return-prediction mechanism and happens even when the
    /// direction guess later turns out wrong.
    fn predict_target(&mut self, pc: usize, fallthrough: usize, dir: Outcome) -> usize {
        if dir == Outcome::N {
            return fallthrough;
        }
        match self.btb.lookup(pc) {
            Some(entry) if entry.is_return => self.ras.pop(),
            Some(entry) => entry.tgt,
            None => fallthrough,
        }
    }

    /// Free-form report of predictor-internal counters, appended to the
    /// main counter block.
    pub fn report_internal(&self) -> String {
        format!(
            " Calls: {}\n Returns: {} ({} with correct target)\n",
            self.calls, self.returns, self.returns_correct_tgt
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::branch::InstFlags;
    use crate::trace::TraceBuilder;

    fn small_cfg() -> BpuConfig {
        BpuConfig {
            mispredict_rate: 0,
            btb_capacity: 4,
            btb_assoc: 1,
            tag_bits: 12,
            ras_capacity: 10,
        }
    }

    #[test]
    fn cold_miss_then_exact_hit() {
        let mut bpu = Bpu::with_seed(&small_cfg(), 0).unwrap();
        let mut t = TraceBuilder::new();
        t.branch(0x1000, 0x2000, true);
        let record = t.records()[0];

        // Cold BTB: direction is right (rate 0) but the target falls
        // through, so only the direction scores.
        let first = bpu.process(&record);
        assert!(first.dir_ok);
        assert!(!first.tgt_ok);
        assert_eq!(first.tgt, record.fallthrough());

        // Trained: both direction and target are exact.
        let second = bpu.process(&record);
        assert!(second.dir_ok && second.tgt_ok);
        assert_eq!(second.tgt, 0x2000);

        let c = bpu.counters();
        assert_eq!(c.instructions, 2);
        assert_eq!(c.branches, 2);
        assert_eq!(c.taken, 2);
        assert_eq!(c.correct_dir, 2);
        assert_eq!(c.correct_tgt, 1);
        assert_eq!(c.correct_full, 1);
    }

    #[test]
    fn return_target_comes_from_ras_not_btb() {
        let mut bpu = Bpu::with_seed(&small_cfg(), 0).unwrap();
        let mut t = TraceBuilder::new();
        t.call(0x100, 0x400)
            .ret(0x450, 0x104)
            .call(0x200, 0x400)
            .ret(0x450, 0x204);
        let records = t.records().to_vec();

        // First call banks 0x104; the first return misses the cold BTB
        // and trains an entry whose stored target field is 0x104.
        let _ = bpu.process(&records[0]);
        let miss = bpu.process(&records[1]);
        assert!(!miss.tgt_ok);

        // Second call banks 0x204. The second return hits the trained
        // entry and must predict from the RAS, not the stale stored
        // field.
        let _ = bpu.process(&records[2]);
        let hit = bpu.process(&records[3]);
        assert_eq!(hit.tgt, 0x204);
        assert!(hit.tgt_ok);
    }

    #[test]
    fn full_noise_never_predicts_direction() {
        let cfg = BpuConfig {
            mispredict_rate: 100,
            ..small_cfg()
        };
        let mut bpu = Bpu::with_seed(&cfg, 7).unwrap();
        let mut t = TraceBuilder::new();
        for k in 0..100 {
            t.branch(0x1000 + k * 4, 0x8000, true);
        }
        for record in t.records() {
            let _ = bpu.process(record);
        }

        let c = bpu.counters();
        assert_eq!(c.branches, 100);
        assert_eq!(c.correct_dir, 0);
        assert_eq!(c.correct_dir_pct(), 0.0);
    }

    #[test]
    fn non_control_flow_only_counts_instructions() {
        let mut bpu = Bpu::with_seed(&small_cfg(), 0).unwrap();
        let mut t = TraceBuilder::new();
        t.other(0x500).other(0x504).other(0x508);
        for record in t.records() {
            let pred = bpu.process(record);
            // Non-branches always predict not-taken/fallthrough.
            assert!(pred.dir_ok && pred.tgt_ok);
        }

        let c = bpu.counters();
        assert_eq!(c.instructions, 3);
        assert_eq!(c.branches, 0);
        assert_eq!(c.taken_pct(), 0.0);
    }

    #[test]
    fn not_taken_branches_never_touch_the_btb() {
        let mut bpu = Bpu::with_seed(&small_cfg(), 0).unwrap();
        let record = InstRecord::new(
            0x1000,
            0x2000,
            InstFlags::pack(4, false, false, true, false),
        );
        for _ in 0..4 {
            let pred = bpu.process(&record);
            assert_eq!(pred.tgt, record.fallthrough());
            assert!(pred.tgt_ok);
        }
        assert_eq!(bpu.counters().correct_full, 4);
    }

    #[test]
    fn calls_push_even_without_control_flow_tag() {
        let mut bpu = Bpu::with_seed(&small_cfg(), 0).unwrap();
        // A call record missing the control-flow tag still banks its
        // return address.
        let odd_call =
            InstRecord::new(0x100, 0x400, InstFlags::pack(4, true, false, false, false));
        let _ = bpu.process(&odd_call);

        let mut t = TraceBuilder::new();
        t.ret(0x450, 0x104).ret(0x450, 0x104);
        let records = t.records().to_vec();
        let _ = bpu.process(&records[0]); // trains the return entry
        let hit = bpu.process(&records[1]);
        assert_eq!(hit.tgt, 0x104);
    }
}
