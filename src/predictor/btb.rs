//! A set-associative branch target buffer (BTB).

use std::collections::VecDeque;

use log::trace;

/// A single cached branch target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BtbEntry {
    /// Tag distinguishing addresses that alias to the same set
    pub tag: usize,
    /// Whether the branch that allocated this entry was a subroutine return
    pub is_return: bool,
    /// Cached target address for this branch
    pub tgt: usize,
}

/// A set-associative cache mapping branch addresses to predicted targets.
///
/// Each set is an insertion-ordered chain bounded by the associativity:
/// new entries go in at the front and the back entry is evicted on
/// overflow. Lookups never promote an entry, so replacement is strictly
/// insertion-order FIFO rather than LRU.
pub struct SetAssocBtb {
    num_sets: usize,
    assoc: usize,
    tag_mask: usize,
    sets: Vec<VecDeque<BtbEntry>>,
}
impl SetAssocBtb {
    pub fn new(capacity: usize, assoc: usize, tag_bits: u32) -> Self {
        assert!(assoc > 0 && capacity % assoc == 0);
        let num_sets = capacity / assoc;
        assert!(num_sets.is_power_of_two());
        assert!(tag_bits > 0 && tag_bits < usize::BITS);
        Self {
            num_sets,
            assoc,
            tag_mask: (1 << tag_bits) - 1,
            sets: (0..num_sets).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }
    pub fn assoc(&self) -> usize {
        self.assoc
    }

    /// Split an instruction address into a set index and a tag.
    pub fn decompose(&self, pc: usize) -> (usize, usize) {
        let index = pc & (self.num_sets - 1);
        let tag = (pc / self.num_sets) & self.tag_mask;
        (index, tag)
    }

    /// Number of entries currently resident in the set `pc` maps to.
    pub fn set_len(&self, pc: usize) -> usize {
        let (index, _) = self.decompose(pc);
        self.sets[index].len()
    }

    /// Look up the entry for `pc`, if one is resident.
    ///
    /// A hit does not reorder the chain.
    pub fn lookup(&self, pc: usize) -> Option<&BtbEntry> {
        let (index, tag) = self.decompose(pc);
        self.sets[index].iter().find(|e| e.tag == tag)
    }

    /// Install or refresh the entry for a taken branch whose target was
    /// mispredicted. The caller is responsible for that gate; every call
    /// to this function mutates the structure.
    ///
    /// A resident tag only has its target refreshed (the return flag set
    /// at allocation is kept). A direct-mapped set replaces its sole
    /// entry in place; otherwise a fresh entry is inserted at the front
    /// and the oldest survivor is evicted on overflow.
    pub fn update(&mut self, pc: usize, tgt: usize, is_return: bool) {
        let (index, tag) = self.decompose(pc);
        let set = &mut self.sets[index];

        if let Some(entry) = set.iter_mut().find(|e| e.tag == tag) {
            entry.tgt = tgt;
            return;
        }

        if self.assoc == 1 {
            if let Some(entry) = set.front_mut() {
                *entry = BtbEntry { tag, is_return, tgt };
                return;
            }
        }

        set.push_front(BtbEntry { tag, is_return, tgt });
        if set.len() > self.assoc {
            let evicted = set.pop_back();
            trace!(
                "BTB set {} evicted tag {:#x} for tag {:#x}",
                index,
                evicted.map(|e| e.tag).unwrap_or(0),
                tag
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Addresses spaced by num_sets alias to the same set with distinct tags.
    fn same_set_pc(base: usize, num_sets: usize, k: usize) -> usize {
        base + k * num_sets
    }

    #[test]
    fn decompose_masks_index_and_tag() {
        let btb = SetAssocBtb::new(1024, 4, 12);
        assert_eq!(btb.num_sets(), 256);
        let (index, tag) = btb.decompose(0x0040_1234);
        assert_eq!(index, 0x34);
        assert_eq!(tag, (0x0040_1234 / 256) & 0xfff);
    }

    #[test]
    fn set_never_exceeds_associativity() {
        let mut btb = SetAssocBtb::new(8, 2, 12);
        let pc = 0x10;
        for k in 0..5 {
            btb.update(same_set_pc(pc, btb.num_sets(), k), 0x1000 + k, false);
            assert!(btb.set_len(pc) <= 2);
        }
        assert_eq!(btb.set_len(pc), 2);
    }

    #[test]
    fn eviction_is_fifo_and_hits_do_not_promote() {
        let mut btb = SetAssocBtb::new(8, 2, 12);
        let ns = btb.num_sets();
        let a = same_set_pc(0x3, ns, 0);
        let b = same_set_pc(0x3, ns, 1);
        let c = same_set_pc(0x3, ns, 2);

        btb.update(a, 0xa0, false);
        btb.update(b, 0xb0, false);

        // A hit on the oldest entry must not save it from eviction.
        assert_eq!(btb.lookup(a).unwrap().tgt, 0xa0);

        btb.update(c, 0xc0, false);
        assert!(btb.lookup(a).is_none());
        assert_eq!(btb.lookup(b).unwrap().tgt, 0xb0);
        assert_eq!(btb.lookup(c).unwrap().tgt, 0xc0);
    }

    #[test]
    fn direct_mapped_replaces_sole_entry() {
        let mut btb = SetAssocBtb::new(4, 1, 12);
        let ns = btb.num_sets();
        let a = same_set_pc(0x1, ns, 0);
        let b = same_set_pc(0x1, ns, 1);

        btb.update(a, 0xa0, false);
        btb.update(b, 0xb0, true);
        assert_eq!(btb.set_len(a), 1);
        assert!(btb.lookup(a).is_none());

        let entry = btb.lookup(b).unwrap();
        assert_eq!(entry.tgt, 0xb0);
        assert!(entry.is_return);
    }

    #[test]
    fn resident_tag_keeps_return_flag_on_update() {
        let mut btb = SetAssocBtb::new(8, 2, 12);
        btb.update(0x40, 0x100, true);
        // A later update for the same tag refreshes only the target.
        btb.update(0x40, 0x200, false);

        let entry = btb.lookup(0x40).unwrap();
        assert_eq!(entry.tgt, 0x200);
        assert!(entry.is_return);
        assert_eq!(btb.set_len(0x40), 1);
    }

    #[test]
    fn addresses_beyond_tag_width_alias() {
        let mut btb = SetAssocBtb::new(16, 1, 4);
        // With 16 sets and 4 tag bits, addresses 0x100 apart are
        // indistinguishable: a lookup of one hits the other's entry.
        let a = 0x123;
        let b = a + 0x100;
        assert_eq!(btb.decompose(a), btb.decompose(b));

        btb.update(a, 0xaaa, false);
        assert_eq!(btb.lookup(b).unwrap().tgt, 0xaaa);
    }
}
