//! Guarded permission templates and the escalation ladder.
//!
//! Each non-fixed placeholder gets one guard per candidate resource. A guard
//! is a DNF over the placeholder's atoms whose shape is bounded by the
//! current escalation level; its activation variables are what the solver
//! assigns.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::infer::{Placeholder, PlaceholderTable};
use crate::ir::Expr;
use crate::solve::{Constraint, Term};

/// Bounds on guard shape at one rung of the escalation ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscalationLevel {
    pub max_clauses: usize,
    pub max_literals: usize,
}

impl EscalationLevel {
    /// Level 0 admits a single unconditional clause; each escalation adds
    /// one clause and one active literal per clause. Literal slots exist for
    /// every atom; `max_literals` caps how many may be active at once.
    pub fn at(level: usize) -> Self {
        Self {
            max_clauses: 1 + level,
            max_literals: level,
        }
    }
}

/// Identifier of one guard within a [`TemplateSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GuardId(pub usize);

/// One guarded resource: `guard ==> acc(resource)` with the guard left open.
#[derive(Clone, Debug)]
pub struct Guard {
    pub id: GuardId,
    pub placeholder: Arc<Placeholder>,
    /// Placeholder-relative resource expression.
    pub resource: Expr,
    /// Canonical rendered form of `resource`, used for location matching.
    pub resource_key: String,
}

impl Guard {
    /// Clause activation variable `c-{g}-{j}`.
    pub fn clause_var(&self, clause: usize) -> String {
        format!("c-{}-{}", self.id.0, clause)
    }

    /// Literal activation variable `l-{g}-{j}-{k}`.
    pub fn literal_var(&self, clause: usize, literal: usize) -> String {
        format!("l-{}-{}-{}", self.id.0, clause, literal)
    }

    /// Literal sign variable `s-{g}-{j}-{k}`: true keeps the atom positive.
    pub fn sign_var(&self, clause: usize, literal: usize) -> String {
        format!("s-{}-{}-{}", self.id.0, clause, literal)
    }
}

/// All guards for all open placeholders at one escalation level.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    pub level: EscalationLevel,
    guards: Vec<Guard>,
    by_placeholder: BTreeMap<String, Vec<GuardId>>,
}

impl TemplateSet {
    pub fn new(table: &PlaceholderTable, level: EscalationLevel) -> Self {
        let mut guards = Vec::new();
        let mut by_placeholder = BTreeMap::new();
        for placeholder in table.iter() {
            if placeholder.fixed {
                continue;
            }
            let mut ids = Vec::new();
            for resource in &placeholder.resources {
                let id = GuardId(guards.len());
                guards.push(Guard {
                    id,
                    placeholder: placeholder.clone(),
                    resource: resource.clone(),
                    resource_key: resource.to_string(),
                });
                ids.push(id);
            }
            by_placeholder.insert(placeholder.name.clone(), ids);
        }
        Self {
            level,
            guards,
            by_placeholder,
        }
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn guard(&self, id: GuardId) -> &Guard {
        &self.guards[id.0]
    }

    /// Guards belonging to one placeholder, in resource order.
    pub fn placeholder_guards(&self, name: &str) -> &[GuardId] {
        self.by_placeholder
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Structural constraints tying activation variables together: an active
    /// literal requires its clause to be active, and each clause may activate
    /// at most `max_literals` of its atom slots.
    pub fn structure(&self) -> Vec<Constraint> {
        let mut out = Vec::new();
        for guard in &self.guards {
            let atoms = guard.placeholder.atoms.len();
            for j in 0..self.level.max_clauses {
                let clause = Term::var(&guard.clause_var(j));
                let mut literals = Vec::new();
                for k in 0..atoms {
                    let literal = Term::var(&guard.literal_var(j, k));
                    out.push(Constraint::Bool(Term::or(vec![
                        Term::not(literal.clone()),
                        clause.clone(),
                    ])));
                    literals.push(literal);
                }
                out.push(Constraint::SumLe {
                    terms: literals,
                    bound: self.level.max_literals as i64,
                });
            }
        }
        out
    }
}
