//! String interner for identifiers.
//!
//! One interner is shared by the raw tree, the elaborator and every error
//! value, so it hands out `&self` access: interning takes a write lock only
//! on a miss.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::Name;

struct InternTable {
    map: FxHashMap<&'static str, Name>,
    strings: Vec<&'static str>,
}

/// Interner mapping identifier text to [`Name`]s.
///
/// Interned strings are leaked; an interner lives for a whole compilation
/// run and the set of identifiers in a program is small.
pub struct StringInterner {
    table: RwLock<InternTable>,
}

impl StringInterner {
    /// Create an interner with the empty string at [`Name::EMPTY`].
    pub fn new() -> Self {
        let mut map = FxHashMap::default();
        map.insert("", Name::EMPTY);
        Self {
            table: RwLock::new(InternTable {
                map,
                strings: vec![""],
            }),
        }
    }

    /// Intern `s`, returning its existing name if it was seen before.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(&name) = self.table.read().map.get(s) {
            return name;
        }

        let mut guard = self.table.write();
        // Another caller may have inserted it between the two locks.
        if let Some(&name) = guard.map.get(s) {
            return name;
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let raw = u32::try_from(guard.strings.len()).unwrap_or(u32::MAX);
        let name = Name::from_raw(raw);
        guard.strings.push(leaked);
        guard.map.insert(leaked, name);
        name
    }

    /// Text of an interned name. Unknown names render as `"<?>"`.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.table
            .read()
            .strings
            .get(name.raw() as usize)
            .copied()
            .unwrap_or("<?>")
    }

    /// Look up a name without interning; `None` if `s` was never interned.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.table.read().map.get(s).copied()
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// True when only the empty string is interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_is_idempotent() {
        let interner = StringInterner::new();
        let a = interner.intern("row");
        let b = interner.intern("row");
        let c = interner.intern("col");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.lookup(a), "row");
        assert_eq!(interner.lookup(c), "col");
        assert_eq!(interner.len(), 3);
    }

    #[test]
    fn empty_name_is_preinterned() {
        let interner = StringInterner::new();
        assert!(interner.is_empty());
        assert_eq!(interner.intern(""), Name::EMPTY);
        assert_eq!(interner.get("missing"), None);
    }

    #[test]
    fn shared_across_threads() {
        let interner = StringInterner::new();
        let names: Vec<Vec<Name>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| ["A", "B", "r1"].map(|s| interner.intern(s)).to_vec()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| panic!("interning thread panicked")))
                .collect()
        });
        assert!(names.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(interner.len(), 4);
        assert_eq!(interner.lookup(names[0][2]), "r1");
    }
}
