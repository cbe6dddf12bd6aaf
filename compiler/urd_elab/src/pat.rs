//! Patterns.

use urd_ir::{
    ast::{PatNode, RawPat},
    Name,
};
use urd_stack::ensure_sufficient_stack;
use urd_types::{ElabError, Idx, KindIdx};

use crate::driver::Elaborator;
use crate::expr::lit_type;
use crate::tree::Pat;

impl Elaborator<'_> {
    /// Check `pat` against `ty`. The variables it binds are appended to
    /// `binds`, left to right.
    pub(crate) fn check_pat(
        &mut self,
        pat: &RawPat,
        ty: Idx,
        binds: &mut Vec<(Name, Idx)>,
    ) -> Result<Pat, ElabError> {
        ensure_sufficient_stack(|| self.check_pat_inner(pat, ty, binds))
    }

    fn check_pat_inner(
        &mut self,
        pat: &RawPat,
        ty: Idx,
        binds: &mut Vec<(Name, Idx)>,
    ) -> Result<Pat, ElabError> {
        let span = pat.span;
        match &pat.node {
            PatNode::Wild => Ok(Pat::Wild),
            PatNode::Var(name) => {
                binds.push((*name, ty));
                Ok(Pat::Var { name: *name, ty })
            }
            PatNode::Lit(lit) => {
                self.unify(ty, lit_type(lit), span)?;
                Ok(Pat::Lit(lit.clone()))
            }
            PatNode::Variant(name, payload) => {
                let field = self.pool.field_name(*name);
                let payload_ty = self.fresh_type(span);
                let single = self.pool.row(KindIdx::TYPE, vec![(field, payload_ty)]);
                let rest = self.fresh_row(KindIdx::TYPE, span);
                let row = self.pool.concat(single, rest);
                let variant = self.pool.variant(row);
                self.unify(ty, variant, span)?;
                self.require_disjoint(single, rest, span)?;
                let payload = match payload {
                    Some(payload) => self.check_pat(payload, payload_ty, binds)?,
                    None => {
                        self.unify(payload_ty, Idx::UNIT_TYPE, span)?;
                        Pat::Wild
                    }
                };
                Ok(Pat::Variant {
                    field,
                    payload: Box::new(payload),
                })
            }
            PatNode::Record { fields, open } => {
                let mut row = Vec::with_capacity(fields.len());
                for (name, _) in fields {
                    let field = self.pool.field_name(*name);
                    let field_ty = self.fresh_type(span);
                    row.push((field, field_ty));
                }
                self.check_literal_fields(KindIdx::TYPE, &row, span)?;
                let listed = self.pool.row(KindIdx::TYPE, row.clone());
                let rest = if *open {
                    Some(self.fresh_row(KindIdx::TYPE, span))
                } else {
                    None
                };
                let whole = match rest {
                    Some(rest) => self.pool.concat(listed, rest),
                    None => listed,
                };
                let record = self.pool.record(whole);
                self.unify(ty, record, span)?;
                if let Some(rest) = rest {
                    self.require_disjoint(listed, rest, span)?;
                }
                let mut out = Vec::with_capacity(fields.len());
                for ((_, sub), (field, field_ty)) in fields.iter().zip(row) {
                    out.push((field, self.check_pat(sub, field_ty, binds)?));
                }
                Ok(Pat::Record { fields: out, rest })
            }
            PatNode::Annot(inner, ann) => {
                let ann = self.check_con(ann, KindIdx::TYPE)?;
                self.unify(ty, ann, span)?;
                self.check_pat(inner, ann, binds)
            }
        }
    }
}

/// Number of term variables `pat` binds.
pub(crate) fn bound_count(pat: &Pat) -> u32 {
    match pat {
        Pat::Wild | Pat::Lit(_) => 0,
        Pat::Var { .. } => 1,
        Pat::Variant { payload, .. } => bound_count(payload),
        Pat::Record { fields, .. } => fields.iter().map(|(_, p)| bound_count(p)).sum(),
    }
}
