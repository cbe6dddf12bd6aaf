//! Constructor building helpers.

use urd_ir::Name;

use crate::{ConData, DefId, Idx, KindIdx, ModId, Pool};

impl Pool {
    #[inline]
    pub fn rel(&mut self, index: u32) -> Idx {
        self.intern(ConData::Rel(index))
    }

    #[inline]
    pub fn named(&mut self, def: DefId) -> Idx {
        self.intern(ConData::Named(def))
    }

    pub fn mod_proj(&mut self, module: ModId, path: Vec<Name>, item: Name) -> Idx {
        self.intern(ConData::ModProj { module, path, item })
    }

    pub fn mod_rel(&mut self, index: u32, path: Vec<Name>, item: Name) -> Idx {
        self.intern(ConData::ModRel { index, path, item })
    }

    #[inline]
    pub fn app(&mut self, func: Idx, arg: Idx) -> Idx {
        self.intern(ConData::App(func, arg))
    }

    /// `func a1 a2 ...`
    pub fn apps(&mut self, func: Idx, args: &[Idx]) -> Idx {
        args.iter().fold(func, |f, &a| self.app(f, a))
    }

    pub fn abs(&mut self, name: Name, kind: KindIdx, body: Idx) -> Idx {
        self.intern(ConData::Abs { name, kind, body })
    }

    #[inline]
    pub fn fun(&mut self, dom: Idx, cod: Idx) -> Idx {
        self.intern(ConData::Fun(dom, cod))
    }

    pub fn poly(&mut self, name: Name, implicit: bool, kind: KindIdx, body: Idx) -> Idx {
        self.intern(ConData::Poly {
            name,
            implicit,
            kind,
            body,
        })
    }

    pub fn kpoly(&mut self, name: Name, body: Idx) -> Idx {
        self.intern(ConData::KPoly { name, body })
    }

    pub fn kabs(&mut self, name: Name, body: Idx) -> Idx {
        self.intern(ConData::KAbs { name, body })
    }

    pub fn kapp(&mut self, con: Idx, kind: KindIdx) -> Idx {
        self.intern(ConData::KApp(con, kind))
    }

    pub fn disjoint(&mut self, left: Idx, right: Idx, body: Idx) -> Idx {
        self.intern(ConData::Disjoint { left, right, body })
    }

    #[inline]
    pub fn record(&mut self, row: Idx) -> Idx {
        self.intern(ConData::Record(row))
    }

    #[inline]
    pub fn variant(&mut self, row: Idx) -> Idx {
        self.intern(ConData::Variant(row))
    }

    pub fn row(&mut self, kind: KindIdx, fields: Vec<(Idx, Idx)>) -> Idx {
        self.intern(ConData::Row { kind, fields })
    }

    /// The empty row at element kind `kind`.
    pub fn empty_row(&mut self, kind: KindIdx) -> Idx {
        self.row(kind, Vec::new())
    }

    #[inline]
    pub fn field_name(&mut self, name: Name) -> Idx {
        self.intern(ConData::FieldName(name))
    }

    /// Row literal over constant field names.
    pub fn row_of(&mut self, kind: KindIdx, fields: &[(Name, Idx)]) -> Idx {
        let fields = fields
            .iter()
            .map(|&(n, v)| (self.field_name(n), v))
            .collect();
        self.row(kind, fields)
    }

    /// `$[n1 = t1, ...]`
    pub fn record_of(&mut self, fields: &[(Name, Idx)]) -> Idx {
        let row = self.row_of(KindIdx::TYPE, fields);
        self.record(row)
    }

    #[inline]
    pub fn concat(&mut self, left: Idx, right: Idx) -> Idx {
        self.intern(ConData::Concat(left, right))
    }

    pub fn map(&mut self, dom: KindIdx, cod: KindIdx, func: Idx, row: Idx) -> Idx {
        self.intern(ConData::Map {
            dom,
            cod,
            func,
            row,
        })
    }

    pub fn proj(&mut self, row: Idx, field: Idx) -> Idx {
        self.intern(ConData::Proj { row, field })
    }

    pub fn tuple(&mut self, elems: Vec<Idx>) -> Idx {
        self.intern(ConData::Tuple(elems))
    }

    pub fn tuple_proj(&mut self, tuple: Idx, index: u32) -> Idx {
        self.intern(ConData::TupleProj(tuple, index))
    }
}
