//! Lowering samples over a template set into a solver formula.

use crate::solve::{Constraint, Formula, Term};

use super::sample::{Abstraction, Record, Sample};
use super::template::{EscalationLevel, Guard, TemplateSet};

/// Build the satisfiability problem for the current corpus: template
/// structure constraints plus one constraint per sample.
pub fn encode(samples: &[Sample], templates: &TemplateSet) -> Formula {
    let mut formula = Formula::default();
    for constraint in templates.structure() {
        formula.push(constraint);
    }
    for sample in samples {
        formula.push(encode_sample(sample, templates));
    }
    formula
}

fn encode_sample(sample: &Sample, templates: &TemplateSet) -> Constraint {
    match sample {
        Sample::LowerBound { records, bound } => {
            let mut terms = Vec::new();
            for record in records {
                terms.extend(contributions(record, templates));
            }
            Constraint::SumGe {
                terms,
                bound: *bound,
            }
        }
        Sample::UpperBound { record, bound } => Constraint::SumLe {
            terms: contributions(record, templates),
            bound: *bound,
        },
        Sample::Implication { left, right } => {
            let cond = contributions(left, templates);
            if cond.is_empty() {
                // A site with no template guards (a fixed specification)
                // demands its permission unconditionally.
                return encode_sample(right, templates);
            }
            Constraint::When {
                cond: Term::or(cond),
                then: Box::new(encode_sample(right, templates)),
            }
        }
    }
}

/// 0/1 contribution terms of one record: one term per guard of the record's
/// placeholder whose resource the record touches.
fn contributions(record: &Record, templates: &TemplateSet) -> Vec<Term> {
    let mut terms = Vec::new();
    for id in templates.placeholder_guards(record.instance.name()) {
        let guard = templates.guard(*id);
        if !record.touches(&guard.resource_key) {
            continue;
        }
        terms.push(guard_contribution(
            guard,
            &record.abstraction,
            templates.level,
        ));
    }
    terms
}

/// A guard contributes one unit to a record iff some active clause is
/// consistent with the record's abstraction: every activated literal's sign
/// must agree with the atom's recorded truth value. Atoms the abstraction
/// leaves undetermined constrain nothing.
fn guard_contribution(guard: &Guard, abstraction: &Abstraction, level: EscalationLevel) -> Term {
    let mut clauses = Vec::new();
    for j in 0..level.max_clauses {
        let mut parts = vec![Term::var(&guard.clause_var(j))];
        for (k, atom) in guard.placeholder.atoms.iter().enumerate() {
            if let Some(value) = abstraction.evaluate(&atom.to_string()) {
                let sign = Term::var(&guard.sign_var(j, k));
                let agree = if value { sign } else { Term::not(sign) };
                parts.push(Term::or(vec![
                    Term::not(Term::var(&guard.literal_var(j, k))),
                    agree,
                ]));
            }
        }
        clauses.push(Term::and(parts));
    }
    Term::or(clauses)
}
