//! Stack growth for deeply nested elaboration.
//!
//! Kind inference, head normalization, unification and expression
//! elaboration all recurse over user-written trees. A pathological input
//! (a thousand nested record concatenations, a long chain of type-level
//! applications) would overflow the native stack long before it exhausts any
//! other resource, so every recursive entry point wraps its body in
//! [`ensure_sufficient_stack`].
//!
//! On native targets the guard delegates to `stacker`; on `wasm32` it is a
//! plain call.

/// Remaining stack below which a new segment is allocated (128 KiB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated stack segment (2 MiB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if fewer than [`RED_ZONE`] bytes remain.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// `wasm32` manages its own stack; run `f` directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a right-nested list the way a long `a ++ (b ++ (c ++ ...))`
    /// chain is built, then measures it recursively.
    #[test]
    fn nested_chain_depth() {
        enum Chain {
            End,
            Link(Box<Chain>),
        }

        fn depth(c: &Chain) -> usize {
            ensure_sufficient_stack(|| match c {
                Chain::End => 0,
                Chain::Link(rest) => depth(rest) + 1,
            })
        }

        let mut chain = Chain::End;
        for _ in 0..50_000 {
            chain = Chain::Link(Box::new(chain));
        }
        assert_eq!(depth(&chain), 50_000);

        // Drop iteratively so the destructor does not recurse.
        let mut cur = chain;
        while let Chain::Link(next) = cur {
            cur = *next;
        }
    }

    #[test]
    fn passes_result_through() {
        let r: Result<u8, &str> = ensure_sufficient_stack(|| Err("kind mismatch"));
        assert_eq!(r, Err("kind mismatch"));
    }
}
