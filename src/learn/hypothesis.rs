//! Decoding solver models into candidate specifications.

use std::collections::BTreeMap;

use crate::infer::PlaceholderTable;
use crate::ir::{Expr, Method};
use crate::solve::Assignment;

use super::template::{Guard, TemplateSet};

/// A candidate specification: one body per placeholder.
#[derive(Clone, Debug)]
pub struct Hypothesis {
    pub predicates: BTreeMap<String, Expr>,
    /// Auxiliary lemma methods shipped alongside the specification.
    pub lemmas: Vec<Method>,
}

impl Hypothesis {
    pub fn body(&self, name: &str) -> Option<&Expr> {
        self.predicates.get(name)
    }

    /// Content hash over the canonical rendering, used to detect a learner
    /// that stopped making progress.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for (name, body) in &self.predicates {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(body.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }
}

/// Decode a satisfying assignment into a hypothesis. Guards with no active
/// clause are omitted; an unconditional clause collapses the guard to a bare
/// permission conjunct.
pub fn build_hypothesis(
    model: &Assignment,
    templates: &TemplateSet,
    table: &PlaceholderTable,
) -> Hypothesis {
    let mut predicates = BTreeMap::new();
    for placeholder in table.iter() {
        // Permission conjuncts come first so the body frames the heap
        // locations any user-written conjunct reads.
        let mut conjuncts: Vec<Expr> = Vec::new();
        if !placeholder.fixed {
            for id in templates.placeholder_guards(&placeholder.name) {
                let guard = templates.guard(*id);
                if let Some(cond) = decode_guard(guard, model, templates) {
                    let access = Expr::acc(guard.resource.clone());
                    conjuncts.push(if cond.is_true() {
                        access
                    } else {
                        Expr::implies(cond, access)
                    });
                }
            }
        }
        conjuncts.extend(placeholder.existing.iter().cloned());
        predicates.insert(placeholder.name.clone(), Expr::and_all(conjuncts));
    }
    Hypothesis {
        predicates,
        lemmas: Vec::new(),
    }
}

fn decode_guard(guard: &Guard, model: &Assignment, templates: &TemplateSet) -> Option<Expr> {
    let mut clauses = Vec::new();
    for j in 0..templates.level.max_clauses {
        if model.get(&guard.clause_var(j)) != Some(&true) {
            continue;
        }
        let mut literals = Vec::new();
        for (k, atom) in guard.placeholder.atoms.iter().enumerate() {
            if model.get(&guard.literal_var(j, k)) == Some(&true) {
                let positive = model.get(&guard.sign_var(j, k)) == Some(&true);
                literals.push(if positive {
                    atom.clone()
                } else {
                    Expr::not(atom.clone())
                });
            }
        }
        clauses.push(Expr::and_all(literals));
    }
    if clauses.is_empty() {
        return None;
    }
    if clauses.iter().any(Expr::is_true) {
        // An unconditional clause subsumes the rest.
        return Some(Expr::Bool(true));
    }
    Some(Expr::or_all(clauses))
}
