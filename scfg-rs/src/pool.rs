//! The sentence-scoped hypothesis arena.
//!
//! All hypotheses of a sentence live in one [`HypoPool`]; everything else
//! (stacks, gap fillers, arc lists) refers to them by [`HypoId`] handles.
//! A handle carries the generation of its slot, so a handle to a slot which
//! has been recycled is detected instead of silently reading another
//! hypothesis.
//!
//! A slot goes through three states:
//!
//! - _live_: the hypothesis is the primary entry of a stack;
//! - _retired_: the hypothesis was pruned or recombined away, but is still
//!   referenced, as the gap filler of another hypothesis or from an arc list;
//! - _free_: the slot is on the free list and will be reused by the next
//!   allocation.
//!
//! Retiring an unreferenced hypothesis frees it at once, and freeing a
//! hypothesis releases its own references, which may in turn free retired
//! hypotheses of smaller spans.

use crate::diag::Diagnostic;
use crate::hypothesis::Hypothesis;

/// A generation-checked handle to a hypothesis of a [`HypoPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct HypoId {
    index: u32,
    generation: u32,
}

impl HypoId {
    /// The slot index, for diagnostics.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Live,
    Retired,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    refs: u32,
    state: SlotState,
    hypo: Option<Hypothesis>,
}

/// Counters of the pool's activity during one sentence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of hypotheses allocated.
    pub allocated: usize,
    /// Number of allocations which reused a freed slot.
    pub recycled: usize,
    /// Number of hypotheses retired.
    pub retired: usize,
    /// Number of slots returned to the free list.
    pub freed: usize,
}

/// The owner of all hypotheses of one sentence decode.
#[derive(Debug, Default)]
pub struct HypoPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    limit: Option<usize>,
    next_seq: u32,
    stats: PoolStats,
}

impl HypoPool {
    /// Creates an empty pool holding at most `limit` hypotheses at once.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        HypoPool {
            limit,
            ..Self::default()
        }
    }

    /// Frees every hypothesis at once, keeping the storage for the next
    /// sentence.  All outstanding handles become stale.
    pub fn reset(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.state != SlotState::Free {
                slot.generation = slot.generation.wrapping_add(1);
            }
            slot.state = SlotState::Free;
            slot.refs = 0;
            slot.hypo = None;
            self.free.push(index as u32);
        }
        self.next_seq = 0;
        self.stats = PoolStats::default();
    }

    /// Stores a new live hypothesis and takes a reference to each of its gap
    /// fillers, preferring a recycled slot.
    ///
    /// Fails with [`Diagnostic::PoolExhausted`] if the pool is full.
    pub fn allocate(&mut self, mut hypo: Hypothesis) -> Result<HypoId, Diagnostic> {
        for &gap in hypo.gaps() {
            self.slot_mut(gap).refs += 1;
        }
        let index = match self.free.pop() {
            Some(index) => {
                self.stats.recycled += 1;
                index
            }
            None => {
                if let Some(limit) = self.limit.filter(|&limit| self.slots.len() >= limit) {
                    for &gap in hypo.gaps() {
                        self.release(gap);
                    }
                    return Err(Diagnostic::PoolExhausted(limit));
                }
                // generation 0 is left to `HypoId::default()`
                self.slots.push(Slot {
                    generation: 1,
                    refs: 0,
                    state: SlotState::Free,
                    hypo: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        hypo.seq = self.next_seq;
        self.next_seq += 1;
        self.stats.allocated += 1;
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.state == SlotState::Free && slot.refs == 0);
        slot.state = SlotState::Live;
        slot.hypo = Some(hypo);
        Ok(HypoId {
            index,
            generation: slot.generation,
        })
    }

    /// Checked accessor to a slot.
    #[inline]
    fn slot(&self, id: HypoId) -> &Slot {
        let slot = &self.slots[id.index as usize];
        assert!(
            slot.generation == id.generation && slot.state != SlotState::Free,
            "Stale hypothesis handle {id:?}!"
        );
        slot
    }

    /// Checked mutable accessor to a slot.
    #[inline]
    fn slot_mut(&mut self, id: HypoId) -> &mut Slot {
        let slot = &mut self.slots[id.index as usize];
        assert!(
            slot.generation == id.generation && slot.state != SlotState::Free,
            "Stale hypothesis handle {id:?}!"
        );
        slot
    }

    /// Returns the hypothesis of a handle, live or retired.
    ///
    /// ## Panics
    /// Panics if the handle is stale.
    #[must_use]
    pub fn get(&self, id: HypoId) -> &Hypothesis {
        match &self.slot(id).hypo {
            Some(hypo) => hypo,
            None => unreachable!("occupied slot without hypothesis"),
        }
    }

    fn get_mut(&mut self, id: HypoId) -> &mut Hypothesis {
        match &mut self.slot_mut(id).hypo {
            Some(hypo) => hypo,
            None => unreachable!("occupied slot without hypothesis"),
        }
    }

    /// Returns true if the handle still refers to a hypothesis, live or
    /// retired.
    #[must_use]
    pub fn contains(&self, id: HypoId) -> bool {
        self.slots.get(id.index as usize).is_some_and(|slot| {
            slot.generation == id.generation && slot.state != SlotState::Free
        })
    }

    /// Returns true if the hypothesis is the primary entry of its stack.
    #[must_use]
    pub fn is_live(&self, id: HypoId) -> bool {
        self.slot(id).state == SlotState::Live
    }

    /// Number of references held on a hypothesis by other hypotheses.
    #[must_use]
    pub fn refs(&self, id: HypoId) -> u32 {
        self.slot(id).refs
    }

    /// Withdraws a live hypothesis from the search.  It is freed right away
    /// unless other hypotheses still refer to it.
    pub fn retire(&mut self, id: HypoId) {
        let slot = self.slot_mut(id);
        assert!(slot.state == SlotState::Live, "Hypothesis {id:?} retired twice!");
        slot.state = SlotState::Retired;
        let refs = slot.refs;
        self.stats.retired += 1;
        if refs == 0 {
            self.free(id);
        }
    }

    /// Records that `loser` was recombined into `winner`: the loser and the
    /// arcs it had collected move to the winner's arc list.
    pub(crate) fn add_arc(&mut self, winner: HypoId, loser: HypoId) {
        let arcs = std::mem::take(&mut self.get_mut(loser).arcs);
        let hypo = self.get_mut(winner);
        hypo.arcs.extend(arcs);
        hypo.arcs.push(loser);
        self.slot_mut(loser).refs += 1;
    }

    fn release(&mut self, id: HypoId) {
        let slot = self.slot_mut(id);
        slot.refs -= 1;
        if slot.refs == 0 && slot.state == SlotState::Retired {
            self.free(id);
        }
    }

    fn free(&mut self, id: HypoId) {
        let mut work = vec![id];
        while let Some(id) = work.pop() {
            let slot = &mut self.slots[id.index as usize];
            debug_assert!(slot.state == SlotState::Retired && slot.refs == 0);
            slot.state = SlotState::Free;
            slot.generation = slot.generation.wrapping_add(1);
            let Some(hypo) = slot.hypo.take() else {
                continue;
            };
            self.free.push(id.index);
            self.stats.freed += 1;
            for &child in hypo.gaps().iter().chain(hypo.arcs()) {
                let slot = self.slot_mut(child);
                slot.refs -= 1;
                if slot.refs == 0 && slot.state == SlotState::Retired {
                    work.push(child);
                }
            }
        }
    }

    /// Number of slots holding a hypothesis, live or retired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true if the pool holds no hypothesis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Activity counters since the last reset.
    #[must_use]
    pub const fn stats(&self) -> PoolStats {
        self.stats
    }
}
