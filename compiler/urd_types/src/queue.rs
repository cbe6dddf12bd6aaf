//! The postponement queue.
//!
//! Obligations that cannot be decided yet wait here, keyed by the
//! metavariables that block them. Solving one of those metavariables
//! ([`PostponeQueue::wake`]) moves every obligation waiting on it to the
//! ready list, from which the driver re-runs them. At a generalization
//! boundary the driver forces whatever is left with
//! [`PostponeQueue::drain`].
//!
//! The queue also owns the dictionary slots: a class use whose resolution
//! was postponed leaves a [`SlotId`] in the elaborated tree, filled once the
//! obligation is discharged.

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use urd_ir::Span;

use crate::class::{ClassScope, Dict};
use crate::disjoint::Fact;
use crate::{Idx, MetaId};

/// A dictionary placeholder in an elaborated tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug)]
pub enum Obligation {
    Unify {
        expected: Idx,
        found: Idx,
        depth: u32,
        span: Span,
    },
    Disjoint {
        left: Idx,
        right: Idx,
        depth: u32,
        facts: Rc<[Fact]>,
        span: Span,
    },
    Class {
        slot: SlotId,
        goal: Idx,
        depth: u32,
        scope: Rc<ClassScope>,
        /// Facts the instance's preconditions are checked under.
        facts: Rc<[Fact]>,
        /// Term binders in scope at the use site.
        val_depth: u32,
        span: Span,
    },
}

impl Obligation {
    pub fn span(&self) -> Span {
        match self {
            Obligation::Unify { span, .. }
            | Obligation::Disjoint { span, .. }
            | Obligation::Class { span, .. } => *span,
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            Obligation::Unify { depth, .. }
            | Obligation::Disjoint { depth, .. }
            | Obligation::Class { depth, .. } => *depth,
        }
    }
}

struct Entry {
    obligation: Obligation,
    blockers: SmallVec<[MetaId; 2]>,
}

#[derive(Default)]
pub struct PostponeQueue {
    entries: Vec<Option<Entry>>,
    waiters: FxHashMap<MetaId, SmallVec<[usize; 4]>>,
    ready: VecDeque<usize>,
    live: usize,
    slots: Vec<(Idx, Option<Dict>)>,
}

impl PostponeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // === Obligations ===

    /// Park `obligation` until one of `blockers` is solved. With no
    /// blockers nothing will ever wake it; it waits for [`Self::drain`].
    pub fn push(&mut self, obligation: Obligation, blockers: SmallVec<[MetaId; 2]>) {
        let id = self.entries.len();
        tracing::debug!(id, ?blockers, ?obligation, "postpone obligation");
        for &var in &blockers {
            self.waiters.entry(var).or_default().push(id);
        }
        self.entries.push(Some(Entry {
            obligation,
            blockers,
        }));
        self.live += 1;
    }

    /// Mark everything waiting on `solved` as ready.
    pub fn wake(&mut self, solved: &[MetaId]) {
        for var in solved {
            let Some(ids) = self.waiters.remove(var) else {
                continue;
            };
            for id in ids {
                if self.entries[id].is_some() && !self.ready.contains(&id) {
                    tracing::debug!(id, ?var, "wake obligation");
                    self.ready.push_back(id);
                }
            }
        }
    }

    /// The next woken obligation, removed from the queue. Re-push it if it
    /// is still undecided.
    pub fn pop_ready(&mut self) -> Option<Obligation> {
        while let Some(id) = self.ready.pop_front() {
            if let Some(entry) = self.take(id) {
                return Some(entry.obligation);
            }
        }
        None
    }

    /// Remove and return every obligation still waiting, oldest first.
    pub fn drain(&mut self) -> Vec<(Obligation, SmallVec<[MetaId; 2]>)> {
        let out = (0..self.entries.len())
            .filter_map(|id| self.take(id))
            .map(|entry| (entry.obligation, entry.blockers))
            .collect();
        self.ready.clear();
        self.waiters.clear();
        out
    }

    fn take(&mut self, id: usize) -> Option<Entry> {
        let entry = self.entries.get_mut(id)?.take()?;
        self.live -= 1;
        for var in &entry.blockers {
            if let Some(ids) = self.waiters.get_mut(var) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.waiters.remove(var);
                }
            }
        }
        Some(entry)
    }

    /// Number of obligations still waiting.
    pub fn pending(&self) -> usize {
        self.live
    }

    // === Dictionary slots ===

    /// A fresh, unfilled slot answering `goal`.
    pub fn new_slot(&mut self, goal: Idx) -> SlotId {
        let id = SlotId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push((goal, None));
        id
    }

    pub fn fill_slot(&mut self, slot: SlotId, dict: Dict) {
        tracing::trace!(?slot, ?dict, "fill dictionary slot");
        if let Some((_, cell)) = self.slots.get_mut(slot.0 as usize) {
            *cell = Some(dict);
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&Dict> {
        self.slots.get(slot.0 as usize)?.1.as_ref()
    }

    /// The class goal a slot was created for.
    pub fn slot_goal(&self, slot: SlotId) -> Option<Idx> {
        self.slots.get(slot.0 as usize).map(|&(goal, _)| goal)
    }
}

#[cfg(test)]
mod tests;
