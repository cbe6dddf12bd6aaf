//! Kinds, constructors and the engines that relate them.
//!
//! This crate is the part of the Urd elaborator that does not look at
//! syntax:
//!
//! - [`KindPool`]: kinds, kind metavariables and the kind unifier.
//! - [`Pool`]: interned constructors, constructor metavariables, skolems,
//!   and the de Bruijn utilities in [`subst`].
//! - [`norm`] and [`row`]: head normalization and the row algebra.
//! - [`disjoint`]: the disjointness solver.
//! - [`unify`]: unification with postponement.
//! - [`queue`]: the postponement queue shared by all obligation kinds.
//! - [`class`]: type-class instance resolution.
//! - [`global`]: definitions, modules, signatures and instances.
//! - [`error`]: the structured errors the elaborator reports.
//!
//! Nothing here is shared across threads. All mutable state of one
//! elaboration run lives in one `Pool` and one `GlobalTable`.

pub mod class;
mod data;
pub mod disjoint;
pub mod error;
mod flags;
pub mod global;
mod idx;
mod kind;
pub mod norm;
mod pool;
pub mod queue;
pub mod row;
pub mod subst;
pub mod traverse;
pub mod unify;

pub use class::{
    is_class_goal, is_class_type, ClassError, ClassResolver, ClassScope, Dict, LocalDict,
    Resolution,
};
pub use data::ConData;
pub use disjoint::{check_disjoint, DisjointError, Disjointness, Fact};
pub use error::{ElabError, ElabErrorKind, ErrorCode, ItemMismatch};
pub use flags::ConFlags;
pub use global::{
    Def, DefEntry, GlobalTable, Instance, InstanceRef, ModEntry, ModItem, ModOrigin, ModRef,
    NamedGlobals, Namespace, Sgn, SgnEntry, SgnItem,
};
pub use idx::{DefId, Idx, MetaId, ModId, SgnId, SkolemId};
pub use kind::{KindData, KindError, KindIdx, KindPool, KindPredicate, KindVarId, KindVarState};
pub use norm::{hnorm, normalize};
pub use pool::{AssignError, GlobalNames, MetaCell, Pool, SkolemInfo, Snapshot, VarState};
pub use queue::{Obligation, PostponeQueue, SlotId};
pub use row::{fields_of, FieldSet, Piece, RowSummary};
pub use subst::{Abstraction, Anchor};
pub use unify::{
    kind_of_head, try_unify, MismatchReason, Postponed, TryResult, UnifyEngine, UnifyError,
};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{Idx, KindIdx, MetaId};
    const _: () = assert!(std::mem::size_of::<Idx>() == 4);
    const _: () = assert!(std::mem::size_of::<KindIdx>() == 4);
    const _: () = assert!(std::mem::size_of::<MetaId>() == 4);
}
