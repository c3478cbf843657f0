// RENC, an evaluator for the Ren-C family of languages.

// SPDX-FileCopyrightText: © 2024 Matthew Rothlisberger
// SPDX-License-Identifier: AGPL-3.0-only

// RENC is licensed under the terms of the GNU Affero General Public
// License version 3. See the top-level LICENSES directory for the
// license text.

// Find full copyright information in the top-level COPYRIGHT file.

// <>

// src/ren/memmgt.rs

// Memory management for Ren. Keeps every series in one pool of
// control records, tracks which of them are still manually owned,
// and reclaims managed series with a mark and sweep collector.

// <>

use super::cell::Cell;
use super::series::{Content, Link, Misc, Series, SeriesId};

/// Running totals kept by the pool
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    /// Collections run since startup
    pub collections: usize,
    /// Series reclaimed by the collector since startup
    pub recycled: usize,
    /// Series freed explicitly
    pub dropped: usize,
    /// Largest live count seen
    pub peak: usize,
}

/// The series pool
pub struct Pool {
    /// Control records; a `None` slot is on the free list
    slots: Vec<Option<Series>>,
    /// Reusable slot numbers
    free: Vec<u32>,
    /// Series not yet handed to the collector with their allocation
    /// serials, oldest first
    manuals: Vec<(u64, SeriesId)>,
    serial: u64,
    /// Allocations left until a collection is due
    ballast: isize,
    /// Value `ballast` is reset to after a collection
    ballast_reset: isize,
    /// Live series allowed before allocation fails
    limit: usize,
    live: usize,
    pub stats: PoolStats,
}

impl Pool {
    pub fn new(ballast: usize, limit: usize) -> Self {
        if cfg!(feature = "memdbg") {
            log::debug!("Creating series pool (ballast {ballast}, limit {limit})");
        }

        Pool {
            slots: Vec::with_capacity(1024),
            free: Vec::new(),
            manuals: Vec::new(),
            serial: 0,
            ballast: ballast as isize,
            ballast_reset: ballast as isize,
            limit,
            live: 0,
            stats: PoolStats::default(),
        }
    }

    /// Allocates an unmanaged series; `None` when the pool is full
    pub fn alloc(&mut self, content: Content) -> Option<SeriesId> {
        if self.live >= self.limit {
            log::warn!("series pool exhausted at {} series", self.live);
            return None;
        }

        let series = Series::new(content);
        let id = match self.free.pop() {
            Some(n) => {
                self.slots[n as usize] = Some(series);
                SeriesId(n)
            }
            None => {
                self.slots.push(Some(series));
                SeriesId(self.slots.len() as u32 - 1)
            }
        };

        self.live += 1;
        self.ballast -= 1;
        self.stats.peak = self.stats.peak.max(self.live);
        self.manuals.push((self.serial, id));
        self.serial += 1;

        if cfg!(feature = "memdbg") {
            log::debug!("S {} BIRTH (live {})", id.0, self.live);
        }

        Some(id)
    }

    #[inline(always)]
    pub fn get(&self, id: SeriesId) -> &Series {
        match self.slots.get(id.0 as usize) {
            Some(Some(s)) => s,
            _ => panic!("access to freed series {}", id.0),
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: SeriesId) -> &mut Series {
        match self.slots.get_mut(id.0 as usize) {
            Some(Some(s)) => s,
            _ => panic!("access to freed series {}", id.0),
        }
    }

    pub fn is_live(&self, id: SeriesId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Some(_)))
    }

    pub fn is_managed(&self, id: SeriesId) -> bool {
        self.get(id).has(super::series::flag::MANAGED)
    }

    /// Hands a series over to the collector
    pub fn manage(&mut self, id: SeriesId) {
        let series = self.get_mut(id);
        if series.has(super::series::flag::MANAGED) {
            return;
        }
        series.set(super::series::flag::MANAGED);

        // the most recent manual is the usual one to be managed
        if let Some(pos) = self.manuals.iter().rposition(|m| m.1 == id) {
            self.manuals.remove(pos);
        }
    }

    /// Releases a series immediately
    pub fn free(&mut self, id: SeriesId) {
        if !self.is_live(id) {
            return;
        }
        if !self.is_managed(id) {
            if let Some(pos) = self.manuals.iter().rposition(|m| m.1 == id) {
                self.manuals.remove(pos);
            }
        }
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
        self.live -= 1;
        self.stats.dropped += 1;

        if cfg!(feature = "memdbg") {
            log::debug!("S {} RECLAIM (live {})", id.0, self.live);
        }
    }

    /// Mark for later cleanup of series allocated from here on
    pub fn manuals_mark(&self) -> u64 {
        self.serial
    }

    /// Frees every series allocated since `mark` and still unmanaged
    pub fn drop_manuals(&mut self, mark: u64) {
        while self.manuals.last().is_some_and(|m| m.0 >= mark) {
            if let Some((_, id)) = self.manuals.pop() {
                self.slots[id.0 as usize] = None;
                self.free.push(id.0);
                self.live -= 1;
                self.stats.dropped += 1;

                if cfg!(feature = "memdbg") {
                    log::debug!("S {} DROP (live {})", id.0, self.live);
                }
            }
        }
    }

    pub fn manuals(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.manuals.iter().map(|m| m.1)
    }

    pub fn live(&self) -> usize {
        self.live
    }

    #[inline(always)]
    pub fn gc_due(&self) -> bool {
        self.ballast <= 0
    }

    /// Marks everything reachable from `roots` and the manual series,
    /// then frees every managed series left unmarked. Returns the count
    /// of series freed.
    pub fn collect(&mut self, root_cells: &[Cell], root_series: &[SeriesId]) -> usize {
        let before = self.live;
        if cfg!(feature = "memdbg") {
            log::debug!("GC mark phase: {} root cells, {} root series", root_cells.len(), root_series.len());
        }

        let mut work: Vec<SeriesId> = Vec::with_capacity(256);
        for cell in root_cells {
            cell.referenced(|s| work.push(s));
        }
        work.extend_from_slice(root_series);
        // unmanaged series are conservatively alive
        work.extend(self.manuals.iter().map(|m| m.1));

        self.propagate(work);

        if cfg!(feature = "memdbg") {
            log::debug!("GC sweep phase");
        }

        let mut freed = 0;
        for n in 0..self.slots.len() {
            let reclaim = match &mut self.slots[n] {
                Some(s) if s.marked => {
                    s.marked = false;
                    false
                }
                Some(s) => s.has(super::series::flag::MANAGED),
                None => false,
            };
            if reclaim {
                self.slots[n] = None;
                self.free.push(n as u32);
                freed += 1;
            }
        }

        self.live -= freed;
        self.ballast = self.ballast_reset;
        self.stats.collections += 1;
        self.stats.recycled += freed;

        log::debug!(
            "GC: {} series before, {} after, {} freed, ballast {}",
            before,
            self.live,
            freed,
            self.ballast
        );

        freed
    }

    /// Iterative mark, so deep or cyclic structures do not recurse
    fn propagate(&mut self, mut work: Vec<SeriesId>) {
        while let Some(id) = work.pop() {
            let Some(Some(series)) = self.slots.get_mut(id.0 as usize) else {
                continue;
            };
            if series.marked {
                continue;
            }
            series.marked = true;

            match series.link {
                Link::Keylist(s) => work.push(s),
                Link::Meta(Some(s)) | Link::Exemplar(Some(s)) => work.push(s),
                _ => {}
            }
            if let Misc::Facade(s) = series.misc {
                work.push(s);
            }
            if let Content::Array(buf) = &series.content {
                for cell in buf.as_slice() {
                    cell.referenced(|s| work.push(s));
                }
            }
        }
    }

    /// Ids of every live series, for diagnostics and tests
    pub fn ids(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(n, _)| SeriesId(n as u32))
    }
}

#[cfg(test)]
mod gc_tests {
    use super::*;
    use crate::ren::cell::Kind;
    use crate::ren::series::Buffer;

    fn array(pool: &mut Pool, cells: &[Cell]) -> SeriesId {
        pool.alloc(Content::Array(Buffer::from_slice(cells))).unwrap()
    }

    #[test]
    fn unreachable_managed_series_are_freed() {
        let mut pool = Pool::new(100, 1000);
        let kept = array(&mut pool, &[]);
        let lost = array(&mut pool, &[]);
        pool.manage(kept);
        pool.manage(lost);

        let root = Cell::series(Kind::Block, kept, 0);
        assert_eq!(pool.collect(&[root], &[]), 1);
        assert!(pool.is_live(kept));
        assert!(!pool.is_live(lost));
    }

    #[test]
    fn manuals_survive_and_keep_children() {
        let mut pool = Pool::new(100, 1000);
        let child = array(&mut pool, &[Cell::integer(1)]);
        pool.manage(child);
        let parent = array(&mut pool, &[Cell::series(Kind::Block, child, 0)]);

        assert_eq!(pool.collect(&[], &[]), 0);
        assert!(pool.is_live(child));

        pool.free(parent);
        assert_eq!(pool.collect(&[], &[]), 1);
        assert!(!pool.is_live(child));
    }

    #[test]
    fn cycles_are_collected() {
        let mut pool = Pool::new(100, 1000);
        let a = array(&mut pool, &[]);
        let b = array(&mut pool, &[Cell::series(Kind::Block, a, 0)]);
        pool.get_mut(a).array_mut().push(Cell::series(Kind::Block, b, 0));
        pool.manage(a);
        pool.manage(b);

        let root = Cell::series(Kind::Block, a, 0);
        assert_eq!(pool.collect(&[root], &[]), 0);
        assert_eq!(pool.collect(&[], &[]), 2);
    }

    #[test]
    fn drop_manuals_frees_to_mark() {
        let mut pool = Pool::new(100, 1000);
        let keep = array(&mut pool, &[]);
        let mark = pool.manuals_mark();
        let t1 = array(&mut pool, &[]);
        let t2 = array(&mut pool, &[]);
        pool.manage(t2);
        pool.drop_manuals(mark);
        assert!(pool.is_live(keep));
        assert!(!pool.is_live(t1));
        assert!(pool.is_live(t2));
    }

    #[test]
    fn limit_and_slot_reuse() {
        let mut pool = Pool::new(100, 2);
        let a = array(&mut pool, &[]);
        let _b = array(&mut pool, &[]);
        assert!(pool.alloc(Content::Array(Buffer::with_capacity(0))).is_none());
        pool.free(a);
        let c = array(&mut pool, &[]);
        assert_eq!(c, a);
        assert_eq!(pool.live(), 2);
    }

    #[test]
    fn ballast_triggers() {
        let mut pool = Pool::new(3, 1000);
        for _ in 0..3 {
            assert!(!pool.gc_due());
            let s = array(&mut pool, &[]);
            pool.manage(s);
        }
        assert!(pool.gc_due());
        pool.collect(&[], &[]);
        assert!(!pool.gc_due());
        assert_eq!(pool.stats.collections, 1);
    }
}
