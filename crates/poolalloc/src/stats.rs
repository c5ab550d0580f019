//! Allocator statistics snapshot.
//!
//! Every byte of every live arena lands in exactly one bucket, so
//! `total_bytes()` equals the number of live arenas times the arena size.

use crate::pool::arena::ArenaCounters;
use crate::pool::header::PoolId;
use crate::pool::manager::PoolManager;
use crate::pool::{blocks_per_pool, class_size, NUM_SIZE_CLASSES, POOL_OVERHEAD};
use crate::util::{is_aligned, SMALL_REQUEST_THRESHOLD};
use core::fmt;

/// Per size-class counters over pools that have blocks handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassStats {
    pub pools: usize,
    pub blocks_in_use: usize,
    pub free_blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub pool_size: usize,
    pub arena_size: usize,
    pub classes: [ClassStats; NUM_SIZE_CLASSES],
    pub arenas: ArenaCounters,
    /// Blocks currently held from the raw allocator.
    pub raw_blocks: usize,
    pub allocated_bytes: usize,
    pub available_bytes: usize,
    /// Free pools, carved or not.
    pub unused_pools: usize,
    pub pool_header_bytes: usize,
    /// Tail bytes of used pools too small for another block.
    pub quantization_bytes: usize,
    /// Slack in front of the first pool of misaligned arenas.
    pub arena_alignment_bytes: usize,
}

impl Stats {
    pub fn arenas_reclaimed(&self) -> usize {
        self.arenas.total_allocated - self.arenas.current
    }

    /// Blocks handed out from pools.
    pub fn blocks_in_use(&self) -> usize {
        self.classes.iter().map(|c| c.blocks_in_use).sum()
    }

    pub fn unused_pool_bytes(&self) -> usize {
        self.unused_pools * self.pool_size
    }

    pub fn total_bytes(&self) -> usize {
        self.allocated_bytes
            + self.available_bytes
            + self.unused_pool_bytes()
            + self.pool_header_bytes
            + self.quantization_bytes
            + self.arena_alignment_bytes
    }
}

impl PoolManager {
    pub(crate) fn stats(&self, raw_blocks: usize) -> Stats {
        let pool_size = self.geometry.pool_size;
        let mut classes = [ClassStats::default(); NUM_SIZE_CLASSES];
        let mut unused_pools = 0;
        let mut arena_alignment_bytes = 0;

        for (ai, a) in self.arenas.live() {
            unused_pools += a.nfreepools as usize;
            if !is_aligned(a.base, pool_size) {
                arena_alignment_bytes += pool_size;
            }
            for slot in 0..a.carved {
                let h = self.header(PoolId { arena: ai, slot });
                let (refs, class) = unsafe { ((*h).ref_count as usize, (*h).size_class as usize) };
                if refs == 0 {
                    continue;
                }
                let c = &mut classes[class];
                c.pools += 1;
                c.blocks_in_use += refs;
                c.free_blocks += blocks_per_pool(class, pool_size) - refs;
            }
        }

        let mut stats = Stats {
            pool_size,
            arena_size: self.geometry.arena_size,
            classes,
            arenas: self.arenas.counters,
            raw_blocks,
            allocated_bytes: 0,
            available_bytes: 0,
            unused_pools,
            pool_header_bytes: 0,
            quantization_bytes: 0,
            arena_alignment_bytes,
        };
        for (class, c) in classes.iter().enumerate() {
            let size = class_size(class);
            stats.allocated_bytes += c.blocks_in_use * size;
            stats.available_bytes += c.free_blocks * size;
            stats.pool_header_bytes += c.pools * POOL_OVERHEAD;
            stats.quantization_bytes += c.pools * ((pool_size - POOL_OVERHEAD) % size);
        }
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Small block threshold = {}, in {} size classes.",
            SMALL_REQUEST_THRESHOLD, NUM_SIZE_CLASSES
        )?;
        writeln!(f)?;
        writeln!(f, "class   size   num pools   blocks in use  avail blocks")?;
        writeln!(f, "-----   ----   ---------   -------------  ------------")?;
        for (class, c) in self.classes.iter().enumerate() {
            if c.pools == 0 {
                continue;
            }
            writeln!(
                f,
                "{:5} {:6} {:11} {:15} {:13}",
                class,
                class_size(class),
                c.pools,
                c.blocks_in_use,
                c.free_blocks
            )?;
        }
        writeln!(f)?;
        line(f, "# arenas allocated total", self.arenas.total_allocated)?;
        line(f, "# arenas reclaimed", self.arenas_reclaimed())?;
        line(f, "# arenas highwater mark", self.arenas.highwater)?;
        line(f, "# arenas allocated current", self.arenas.current)?;
        line(f, "# bytes in live arenas", self.arenas.current * self.arena_size)?;
        writeln!(f)?;
        line(f, "# raw allocator blocks", self.raw_blocks)?;
        line(f, "# bytes in allocated blocks", self.allocated_bytes)?;
        line(f, "# bytes in available blocks", self.available_bytes)?;
        line(f, "# unused pools", self.unused_pools)?;
        line(f, "# bytes in unused pools", self.unused_pool_bytes())?;
        line(f, "# bytes lost to pool headers", self.pool_header_bytes)?;
        line(f, "# bytes lost to quantization", self.quantization_bytes)?;
        line(f, "# bytes lost to arena alignment", self.arena_alignment_bytes)?;
        line(f, "Total", self.total_bytes())
    }
}

fn line(f: &mut fmt::Formatter<'_>, label: &str, value: usize) -> fmt::Result {
    writeln!(f, "{label:<35}= {value:>21}")
}

/// Unbuffered `fmt::Write` over a file descriptor. Formats a [`Stats`]
/// without touching the heap, so it works under the global allocator.
pub(crate) struct FdWriter(pub libc::c_int);

impl fmt::Write for FdWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut rest = s.as_bytes();
        while !rest.is_empty() {
            let n = unsafe { libc::write(self.0, rest.as_ptr() as *const libc::c_void, rest.len()) };
            if n <= 0 {
                return Err(fmt::Error);
            }
            rest = &rest[n as usize..];
        }
        Ok(())
    }
}
