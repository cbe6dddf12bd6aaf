//! Urd IR: the vocabulary shared by the elaborator and its collaborators.
//!
//! - [`Name`] and [`StringInterner`] for identifiers
//! - [`Span`] for source locations
//! - [`ast`], the raw syntax tree a parser produces
//!
//! Everything here is plain data with `Clone + Eq`; nothing depends on the
//! type system.

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod ast;
mod interner;
mod name;
mod span;

pub use interner::StringInterner;
pub use name::Name;
pub use span::Span;
