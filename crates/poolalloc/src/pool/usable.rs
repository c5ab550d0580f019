//! The usable-arena list: arenas with at least one free pool, kept sorted
//! by ascending free-pool count so allocation drains the fullest arena
//! first and nearly empty arenas get the chance to become wholly free.
//!
//! `last_with[k]` names the right-most listed arena with exactly `k` free
//! pools, which makes re-sorting after a pool return O(1).

use super::arena::{ArenaIndex, ArenaTable};
use crate::util::MAX_POOLS_IN_ARENA;

pub(crate) struct UsableArenas {
    head: Option<ArenaIndex>,
    last_with: [Option<ArenaIndex>; MAX_POOLS_IN_ARENA + 1],
}

impl UsableArenas {
    pub(crate) const fn new() -> Self {
        UsableArenas {
            head: None,
            last_with: [None; MAX_POOLS_IN_ARENA + 1],
        }
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn last_with(&self, nfree: usize) -> Option<ArenaIndex> {
        self.last_with.get(nfree).copied().flatten()
    }

    /// Listed arenas from head to tail.
    pub(crate) fn iter<'a>(&self, table: &'a ArenaTable) -> impl Iterator<Item = ArenaIndex> + 'a {
        core::iter::successors(self.head, move |&i| table.get(i).and_then(|a| a.next))
    }

    /// Make a freshly acquired arena the only listed one.
    pub(crate) fn install(&mut self, idx: ArenaIndex, table: &mut ArenaTable) {
        debug_assert!(self.head.is_none());
        let nf = table[idx].nfreepools as usize;
        table[idx].next = None;
        table[idx].prev = None;
        self.head = Some(idx);
        debug_assert!(self.last_with[nf].is_none());
        self.last_with[nf] = Some(idx);
    }

    /// Charge one pool to the head arena. The head has the fewest free
    /// pools, so it stays sorted; it leaves the list once exhausted.
    pub(crate) fn take_from_head(&mut self, table: &mut ArenaTable) -> Option<ArenaIndex> {
        let idx = self.head?;
        let nf = table[idx].nfreepools as usize;
        debug_assert!(nf > 0);
        if self.last_with[nf] == Some(idx) {
            self.last_with[nf] = None;
        }
        if nf > 1 {
            self.last_with[nf - 1] = Some(idx);
        }
        table[idx].nfreepools -= 1;
        if nf == 1 {
            self.unlink(idx, table);
        }
        Some(idx)
    }

    /// Credit one pool back to `idx` and restore the ordering.
    ///
    /// Returns `true` when the arena became wholly free while another
    /// usable arena sits to its right; it is then unlinked and the caller
    /// must release it. The right-most wholly free arena is kept so a
    /// free/alloc cycle at the boundary does not thrash the provider.
    pub(crate) fn pool_returned(&mut self, idx: ArenaIndex, table: &mut ArenaTable) -> bool {
        let old = table[idx].nfreepools;
        let listed = old > 0;
        let lastnf = self.last_with[old as usize];
        if lastnf == Some(idx) {
            self.last_with[old as usize] = match table[idx].prev {
                Some(p) if table[p].nfreepools == old => Some(p),
                _ => None,
            };
        }
        let nf = old + 1;
        table[idx].nfreepools = nf;

        if listed && nf == table[idx].ntotalpools && table[idx].next.is_some() {
            self.unlink(idx, table);
            return true;
        }

        if !listed {
            // Fewest possible free pools: goes to the front.
            table[idx].prev = None;
            table[idx].next = self.head;
            if let Some(h) = self.head {
                table[h].prev = Some(idx);
            }
            self.head = Some(idx);
            if self.last_with[nf as usize].is_none() {
                self.last_with[nf as usize] = Some(idx);
            }
            return false;
        }

        if self.last_with[nf as usize].is_none() {
            self.last_with[nf as usize] = Some(idx);
        }
        if lastnf == Some(idx) {
            return false;
        }
        // Everything right of `lastnf` has at least `nf` free pools.
        if let Some(after) = lastnf {
            self.unlink(idx, table);
            self.insert_after(idx, after, table);
        }
        false
    }

    fn unlink(&mut self, idx: ArenaIndex, table: &mut ArenaTable) {
        let (prev, next) = (table[idx].prev, table[idx].next);
        match prev {
            Some(p) => table[p].next = next,
            None => {
                debug_assert_eq!(self.head, Some(idx));
                self.head = next;
            }
        }
        if let Some(n) = next {
            table[n].prev = prev;
        }
        table[idx].next = None;
        table[idx].prev = None;
    }

    fn insert_after(&mut self, idx: ArenaIndex, after: ArenaIndex, table: &mut ArenaTable) {
        let next = table[after].next;
        table[idx].prev = Some(after);
        table[idx].next = next;
        if let Some(n) = next {
            table[n].prev = Some(idx);
        }
        table[after].next = Some(idx);
    }
}
