//! Structural self-check over the whole allocator state.

use crate::pool::arena::ArenaIndex;
use crate::pool::header::PoolId;
use crate::pool::manager::PoolManager;
use crate::util::MAX_POOLS_IN_ARENA;

/// Result of an integrity scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntegrityResult {
    pub arenas_checked: usize,
    pub pools_checked: usize,
    pub errors_found: usize,
    /// Usable list out of ascending free-pool order.
    pub order_violations: usize,
    /// Wrong `last_with` entries.
    pub cache_violations: usize,
    /// Broken back-links, dead arenas on lists, cycles.
    pub link_violations: usize,
    /// Counters that disagree with the lists they summarize.
    pub count_mismatches: usize,
}

impl IntegrityResult {
    pub fn is_ok(&self) -> bool {
        self.errors_found == 0
    }

    fn order(&mut self) {
        self.order_violations += 1;
        self.errors_found += 1;
    }

    fn cache(&mut self) {
        self.cache_violations += 1;
        self.errors_found += 1;
    }

    fn link(&mut self) {
        self.link_violations += 1;
        self.errors_found += 1;
    }

    fn count(&mut self) {
        self.count_mismatches += 1;
        self.errors_found += 1;
    }
}

impl PoolManager {
    pub(crate) fn check_integrity(&self) -> IntegrityResult {
        let mut r = IntegrityResult::default();
        let bound = self.arenas.capacity() + 1;

        // Usable list: live, non-exhausted, sorted, back-linked.
        // Allocation-free so it can run under the global allocator's lock.
        let mut listed = 0usize;
        let mut want: [Option<ArenaIndex>; MAX_POOLS_IN_ARENA + 1] = [None; MAX_POOLS_IN_ARENA + 1];
        let mut prev: Option<ArenaIndex> = None;
        for idx in self.usable.iter(&self.arenas).take(bound) {
            let a = &self.arenas[idx];
            if !a.is_live() || a.prev != prev {
                r.link();
            }
            if a.nfreepools == 0 {
                r.count();
            }
            if let Some(p) = prev {
                if self.arenas[p].nfreepools > a.nfreepools {
                    r.order();
                }
            }
            if let Some(slot) = want.get_mut(a.nfreepools as usize) {
                *slot = Some(idx);
            }
            listed += 1;
            prev = Some(idx);
        }
        if listed == bound {
            r.link();
        }
        let expected = self.arenas.live().filter(|(_, a)| a.nfreepools > 0).count();
        if listed != expected {
            r.count();
        }
        for (k, w) in want.iter().enumerate() {
            if self.usable.last_with(k) != *w {
                r.cache();
            }
        }

        // Per arena: free-pool list plus uncarved pools add up.
        for (ai, a) in self.arenas.live() {
            r.arenas_checked += 1;
            if a.carved > a.ntotalpools || a.nfreepools > a.ntotalpools {
                r.count();
                continue;
            }
            let mut free = 0u32;
            let mut cursor = a.freepools;
            while let Some(slot) = cursor {
                if slot >= a.carved || free > a.carved {
                    r.link();
                    break;
                }
                let h = self.header(PoolId { arena: ai, slot });
                unsafe {
                    if (*h).ref_count != 0 || (*h).arena() != ai {
                        r.count();
                    }
                    cursor = (*h).next.map(|p| p.slot);
                }
                free += 1;
            }
            if free + (a.ntotalpools - a.carved) != a.nfreepools {
                r.count();
            }
            for slot in 0..a.carved {
                r.pools_checked += 1;
                let h = self.header(PoolId { arena: ai, slot });
                if unsafe { (*h).arena() } != ai {
                    r.link();
                }
            }
        }

        // Rings: used pools of the right class with a free block each.
        for (class, head) in self.rings.iter().enumerate() {
            let mut prev: Option<PoolId> = None;
            let mut cursor = *head;
            let mut steps = 0usize;
            while let Some(pid) = cursor {
                steps += 1;
                let live = self
                    .arenas
                    .get(pid.arena)
                    .is_some_and(|a| a.is_live() && pid.slot < a.carved);
                if !live || steps > self.arenas.capacity() * MAX_POOLS_IN_ARENA {
                    r.link();
                    break;
                }
                let h = self.header(pid);
                unsafe {
                    if (*h).prev != prev {
                        r.link();
                    }
                    if (*h).size_class as usize != class || (*h).ref_count == 0 || (*h).free_block.is_null() {
                        r.count();
                    }
                    prev = cursor;
                    cursor = (*h).next;
                }
            }
        }

        // Unused descriptors carry no region.
        let mut cursor = self.arenas.unused_head();
        let mut steps = 0;
        while let Some(idx) = cursor {
            steps += 1;
            match self.arenas.get(idx) {
                Some(a) if !a.is_live() && steps <= bound => cursor = a.next,
                _ => {
                    r.link();
                    break;
                }
            }
        }

        r
    }
}
