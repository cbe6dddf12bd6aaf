//! Surface-syntax rendering of constructors.

use std::fmt::Write as _;

use urd_ir::{Name, StringInterner};

use crate::{ConData, DefId, Idx, ModId, Pool};

/// Source of display names for global definitions and modules.
pub trait GlobalNames {
    fn def_name(&self, def: DefId) -> Option<String>;
    fn module_name(&self, module: ModId) -> Option<String>;
}

/// Names nothing; globals render as `def#n` and `mod#n`.
struct Anonymous;

impl GlobalNames for Anonymous {
    fn def_name(&self, _def: DefId) -> Option<String> {
        None
    }

    fn module_name(&self, _module: ModId) -> Option<String> {
        None
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
enum Prec {
    Top,
    Arrow,
    App,
    Atom,
}

struct Printer<'a> {
    pool: &'a Pool,
    interner: &'a StringInterner,
    globals: &'a dyn GlobalNames,
    con_names: Vec<Name>,
    kind_names: Vec<Name>,
    buf: String,
}

impl Printer<'_> {
    fn name(&mut self, name: Name) {
        self.buf.push_str(self.interner.lookup(name));
    }

    fn kind(&mut self, k: crate::KindIdx) {
        self.pool
            .kinds()
            .format_into(k, self.interner, &mut self.kind_names, &mut self.buf);
    }

    fn module(&mut self, module: ModId) {
        match self.globals.module_name(module) {
            Some(name) => self.buf.push_str(&name),
            None => {
                let _ = write!(self.buf, "{module:?}");
            }
        }
    }

    fn path(&mut self, path: &[Name], item: Name) {
        for &p in path {
            self.buf.push('.');
            self.name(p);
        }
        self.buf.push('.');
        self.name(item);
    }

    fn open(&mut self, needed: bool) {
        if needed {
            self.buf.push('(');
        }
    }

    fn close(&mut self, needed: bool) {
        if needed {
            self.buf.push(')');
        }
    }

    fn con(&mut self, idx: Idx, prec: Prec) {
        urd_stack::ensure_sufficient_stack(|| self.con_inner(idx, prec));
    }

    fn con_inner(&mut self, idx: Idx, prec: Prec) {
        let pool = self.pool;
        match pool.data(idx) {
            ConData::Int => self.buf.push_str("int"),
            ConData::Float => self.buf.push_str("float"),
            ConData::String => self.buf.push_str("string"),
            ConData::Char => self.buf.push_str("char"),
            ConData::Bool => self.buf.push_str("bool"),
            ConData::Unit => self.buf.push_str("()"),
            ConData::Error => self.buf.push_str("<error>"),
            ConData::Rel(i) => {
                let depth = self.con_names.len();
                match (*i as usize).checked_add(1).and_then(|n| depth.checked_sub(n)) {
                    Some(pos) => self.name(self.con_names[pos]),
                    None => {
                        let _ = write!(self.buf, "_{i}");
                    }
                }
            }
            ConData::Named(def) => match self.globals.def_name(*def) {
                Some(name) => self.buf.push_str(&name),
                None => {
                    let _ = write!(self.buf, "{def:?}");
                }
            },
            ConData::ModProj { module, path, item } => {
                self.module(*module);
                self.path(path, *item);
            }
            ConData::ModRel { index, path, item } => {
                let _ = write!(self.buf, "^{index}");
                self.path(path, *item);
            }
            ConData::Skolem(id) => {
                self.buf.push('\'');
                self.name(pool.skolem(*id).name);
            }
            ConData::Meta { var, .. } => {
                let _ = write!(self.buf, "{var:?}");
            }
            ConData::App(f, a) => {
                let parens = prec > Prec::App;
                self.open(parens);
                self.con(*f, Prec::App);
                self.buf.push(' ');
                self.con(*a, Prec::Atom);
                self.close(parens);
            }
            ConData::Abs { name, kind, body } => {
                let parens = prec > Prec::Top;
                self.open(parens);
                self.buf.push_str("fn ");
                self.name(*name);
                self.buf.push_str(" :: ");
                self.kind(*kind);
                self.buf.push_str(" => ");
                self.con_names.push(*name);
                self.con(*body, Prec::Top);
                self.con_names.pop();
                self.close(parens);
            }
            ConData::KAbs { name, body } => {
                let parens = prec > Prec::Top;
                self.open(parens);
                self.buf.push_str("fn [[");
                self.name(*name);
                self.buf.push_str("]] => ");
                self.kind_names.push(*name);
                self.con(*body, Prec::Top);
                self.kind_names.pop();
                self.close(parens);
            }
            ConData::KApp(c, k) => {
                let parens = prec > Prec::App;
                self.open(parens);
                self.con(*c, Prec::App);
                self.buf.push_str(" [[");
                self.kind(*k);
                self.buf.push_str("]]");
                self.close(parens);
            }
            ConData::Fun(a, b) => {
                let parens = prec > Prec::Arrow;
                self.open(parens);
                self.con(*a, Prec::App);
                self.buf.push_str(" -> ");
                self.con(*b, Prec::Arrow);
                self.close(parens);
            }
            ConData::Poly {
                name,
                implicit,
                kind,
                body,
            } => {
                let parens = prec > Prec::Arrow;
                self.open(parens);
                self.name(*name);
                self.buf.push_str(if *implicit { " ::: " } else { " :: " });
                self.kind(*kind);
                self.buf.push_str(" -> ");
                self.con_names.push(*name);
                self.con(*body, Prec::Arrow);
                self.con_names.pop();
                self.close(parens);
            }
            ConData::KPoly { name, body } => {
                let parens = prec > Prec::Arrow;
                self.open(parens);
                self.name(*name);
                self.buf.push_str(" --> ");
                self.kind_names.push(*name);
                self.con(*body, Prec::Arrow);
                self.kind_names.pop();
                self.close(parens);
            }
            ConData::Disjoint { left, right, body } => {
                let parens = prec > Prec::Arrow;
                self.open(parens);
                self.buf.push('[');
                self.con(*left, Prec::Arrow);
                self.buf.push_str(" ~ ");
                self.con(*right, Prec::Arrow);
                self.buf.push_str("] => ");
                self.con(*body, Prec::Arrow);
                self.close(parens);
            }
            ConData::Record(r) => {
                self.buf.push('$');
                self.con(*r, Prec::Atom);
            }
            ConData::Variant(r) => {
                let parens = prec > Prec::App;
                self.open(parens);
                self.buf.push_str("variant ");
                self.con(*r, Prec::Atom);
                self.close(parens);
            }
            ConData::Row { fields, .. } => {
                self.buf.push('[');
                for (i, &(n, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        self.buf.push_str(", ");
                    }
                    match pool.data(n) {
                        ConData::FieldName(name) => self.name(*name),
                        _ => self.con(n, Prec::Atom),
                    }
                    self.buf.push_str(" = ");
                    self.con(v, Prec::Arrow);
                }
                self.buf.push(']');
            }
            ConData::FieldName(name) => {
                self.buf.push('#');
                self.name(*name);
            }
            ConData::Concat(l, r) => {
                let parens = prec > Prec::Top;
                self.open(parens);
                self.con(*l, Prec::App);
                self.buf.push_str(" ++ ");
                self.con(*r, Prec::Arrow);
                self.close(parens);
            }
            ConData::Map { func, row, .. } => {
                let parens = prec > Prec::App;
                self.open(parens);
                self.buf.push_str("map ");
                self.con(*func, Prec::Atom);
                self.buf.push(' ');
                self.con(*row, Prec::Atom);
                self.close(parens);
            }
            ConData::Proj { row, field } => {
                self.con(*row, Prec::Atom);
                self.buf.push('[');
                match pool.data(*field) {
                    ConData::FieldName(name) => self.name(*name),
                    _ => self.con(*field, Prec::Top),
                }
                self.buf.push(']');
            }
            ConData::Tuple(cs) => {
                self.buf.push('(');
                for (i, &c) in cs.iter().enumerate() {
                    if i > 0 {
                        self.buf.push_str(", ");
                    }
                    self.con(c, Prec::Top);
                }
                self.buf.push(')');
            }
            ConData::TupleProj(c, i) => {
                self.con(*c, Prec::Atom);
                let _ = write!(self.buf, ".{}", i + 1);
            }
        }
    }
}

impl Pool {
    /// Render `idx` in surface syntax. Solved metavariables are shown by
    /// their solutions; globals by their raw ids.
    pub fn format(&mut self, idx: Idx, interner: &StringInterner) -> String {
        self.format_with(idx, interner, &Anonymous)
    }

    /// Render `idx`, naming globals through `globals`.
    pub fn format_with(
        &mut self,
        idx: Idx,
        interner: &StringInterner,
        globals: &dyn GlobalNames,
    ) -> String {
        let idx = self.zonk(idx);
        let mut printer = Printer {
            pool: self,
            interner,
            globals,
            con_names: Vec::new(),
            kind_names: Vec::new(),
            buf: String::new(),
        };
        printer.con(idx, Prec::Top);
        printer.buf
    }
}
