//! Obligations: unification, disjointness and class constraints.
//!
//! Every constraint the elaborator emits goes through here. It is tried at
//! once; what cannot be decided yet is parked in the group's
//! [`PostponeQueue`](urd_types::PostponeQueue) under the metavariables that
//! block it and re-tried as soon as one of them is solved.

use std::rc::Rc;

use urd_ir::Span;
use urd_types::{
    check_disjoint, ClassResolver, Disjointness, ElabError, Idx, KindError, KindIdx, Obligation,
    Resolution, SlotId, UnifyEngine,
};

use crate::driver::Elaborator;

impl Elaborator<'_> {
    // ========================================
    // Fresh variables
    // ========================================

    pub(crate) fn fresh_meta(&mut self, kind: KindIdx, span: Span) -> Idx {
        let depth = self.env.con_depth();
        self.pool.fresh_meta(kind, span, depth)
    }

    pub(crate) fn fresh_type(&mut self, span: Span) -> Idx {
        self.fresh_meta(KindIdx::TYPE, span)
    }

    /// A fresh row whose fields have kind `elem`.
    pub(crate) fn fresh_row(&mut self, elem: KindIdx, span: Span) -> Idx {
        let kind = self.pool.kinds_mut().record(elem);
        self.fresh_meta(kind, span)
    }

    pub(crate) fn fresh_kind(&mut self, span: Span) -> KindIdx {
        self.pool.kinds_mut().fresh(span)
    }

    pub(crate) fn unify_kind(
        &mut self,
        expected: KindIdx,
        found: KindIdx,
        con: Option<Idx>,
        span: Span,
    ) -> Result<(), ElabError> {
        self.pool
            .kinds_mut()
            .unify(expected, found)
            .map_err(|err: KindError| ElabError::from_kind(span, err, con))
    }

    // ========================================
    // Emitting obligations
    // ========================================

    /// `expected = found` at the current binder depth.
    pub(crate) fn unify(&mut self, expected: Idx, found: Idx, span: Span) -> Result<(), ElabError> {
        let depth = self.env.con_depth();
        self.discharge(Obligation::Unify {
            expected,
            found,
            depth,
            span,
        })?;
        self.wake_and_run()
    }

    /// `left ~ right` under the facts in scope.
    pub(crate) fn require_disjoint(
        &mut self,
        left: Idx,
        right: Idx,
        span: Span,
    ) -> Result<(), ElabError> {
        let depth = self.env.con_depth();
        let facts = self.env.facts(&mut self.pool);
        self.discharge(Obligation::Disjoint {
            left,
            right,
            depth,
            facts,
            span,
        })?;
        self.wake_and_run()
    }

    /// An instance of `goal`, through a dictionary slot filled once it is
    /// known.
    pub(crate) fn require_class(&mut self, goal: Idx, span: Span) -> Result<SlotId, ElabError> {
        let slot = self.queue.new_slot(goal);
        let depth = self.env.con_depth();
        let facts = self.env.facts(&mut self.pool);
        let scope = Rc::new(self.env.class_scope());
        self.discharge(Obligation::Class {
            slot,
            goal,
            depth,
            scope,
            facts,
            val_depth: self.env.val_depth(),
            span,
        })?;
        self.wake_and_run()?;
        Ok(slot)
    }

    // ========================================
    // Running the queue
    // ========================================

    /// Re-run every obligation woken by a solution, until none is ready.
    pub(crate) fn wake_and_run(&mut self) -> Result<(), ElabError> {
        loop {
            let solved = self.pool.take_resolved();
            self.queue.wake(&solved);
            let Some(obligation) = self.queue.pop_ready() else {
                return Ok(());
            };
            self.discharge(obligation)?;
        }
    }

    /// Try `obligation` once. Returns whether it was decided; undecided
    /// obligations go back to the queue.
    pub(crate) fn discharge(&mut self, obligation: Obligation) -> Result<bool, ElabError> {
        match obligation {
            Obligation::Unify {
                expected,
                found,
                depth,
                span,
            } => {
                let mut engine = UnifyEngine::new(&mut self.pool, &self.globals, depth, span);
                let result = engine.unify(expected, found);
                let postponed = engine.take_postponed();
                result.map_err(|err| ElabError::from_unify(span, err))?;
                let decided = postponed.is_empty();
                for p in postponed {
                    self.queue.push(
                        Obligation::Unify {
                            expected: p.expected,
                            found: p.found,
                            depth: p.depth,
                            span,
                        },
                        p.blockers,
                    );
                }
                Ok(decided)
            }
            Obligation::Disjoint {
                left,
                right,
                depth,
                facts,
                span,
            } => match check_disjoint(&mut self.pool, &self.globals, left, right, &facts) {
                Ok(Disjointness::Definite) => Ok(true),
                Ok(Disjointness::Deferred { blockers }) => {
                    self.queue.push(
                        Obligation::Disjoint {
                            left,
                            right,
                            depth,
                            facts,
                            span,
                        },
                        blockers,
                    );
                    Ok(false)
                }
                Err(err) => Err(ElabError::from_disjoint(span, err)),
            },
            Obligation::Class {
                slot,
                goal,
                depth,
                scope,
                facts,
                val_depth,
                span,
            } => {
                let resolution = ClassResolver::new(
                    &mut self.pool,
                    &self.globals,
                    &scope,
                    depth,
                    val_depth,
                )
                .with_max_depth(self.config.max_instance_depth)
                .with_span(span)
                .resolve(goal)
                .map_err(|err| ElabError::from_class(span, err))?;
                match resolution {
                    Resolution::Resolved { dict, disjoint } => {
                        self.queue.fill_slot(slot, dict);
                        for (left, right) in disjoint {
                            self.discharge(Obligation::Disjoint {
                                left,
                                right,
                                depth,
                                facts: Rc::clone(&facts),
                                span,
                            })?;
                        }
                        Ok(true)
                    }
                    Resolution::Deferred { blockers } => {
                        self.queue.push(
                            Obligation::Class {
                                slot,
                                goal,
                                depth,
                                scope,
                                facts,
                                val_depth,
                                span,
                            },
                            blockers,
                        );
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Run the queue to a fixed point: re-try every waiting obligation
    /// until a whole round decides nothing and solves nothing. What is left
    /// is returned with its blockers.
    pub(crate) fn force(
        &mut self,
    ) -> Result<Vec<(Obligation, smallvec::SmallVec<[urd_types::MetaId; 2]>)>, ElabError> {
        for round in 0..self.config.max_wake_rounds {
            self.wake_and_run()?;
            let pending = self.queue.drain();
            if pending.is_empty() {
                return Ok(Vec::new());
            }
            let mut progress = false;
            for (obligation, _) in pending {
                progress |= self.discharge(obligation)?;
            }
            let solved = self.pool.take_resolved();
            progress |= !solved.is_empty();
            self.queue.wake(&solved);
            tracing::trace!(round, progress, pending = self.queue.pending(), "forcing round");
            if !progress {
                break;
            }
        }
        self.wake_and_run()?;
        Ok(self.queue.drain())
    }
}
