//! Turning verification failures into permission samples.
//!
//! A failure names a concrete location, the units demanded and held, and
//! the labels passed on the failing path. Extraction adapts the location
//! into the vocabulary of every specification site on that path and emits a
//! sample constraining how much permission those sites may carry.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::InferenceConfig;
use crate::ir::{BinOp, Expr, Program};
use crate::learn::{Abstraction, Hypothesis, Record, RecordKind, Sample};
use crate::oracle::{FailureReason, Value, VerificationError};
use crate::query::{Query, QueryKind, Snapshot};

mod adaptor;

pub use adaptor::{adapt, concretize, eval_pure, ConcreteLoc};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failure cannot be repaired by a permission specification: {0}")]
    Undecodable(String),
}

/// Extract a sample from a failed query.
pub fn extract(
    query: &Query,
    program: &Program,
    hypothesis: &Hypothesis,
    error: &VerificationError,
    config: &InferenceConfig,
) -> Result<Sample, ExtractError> {
    if error.reason == FailureReason::AssertionViolation {
        return Err(ExtractError::Undecodable(error.to_string()));
    }
    let Some(loc) = concretize(&error.location, &error.model) else {
        return Err(ExtractError::Undecodable(format!(
            "location {} has no concrete denotation",
            error.location
        )));
    };

    let failing = error.info.and_then(|info| query.snapshot(info));
    let reached = query.reached(&error.labels);

    let sample = match (query.kind, failing) {
        // A framing failure, or a failure while inhaling: the site itself
        // must frame the location it reads.
        (QueryKind::Framing, Some(snapshot)) => Sample::LowerBound {
            records: vec![record(snapshot, &loc, error, program, config)],
            bound: error.demanded,
        },
        (QueryKind::Framing, None) => {
            return Err(ExtractError::Undecodable(
                "framing failure outside any specification site".to_string(),
            ));
        }
        (QueryKind::Basic, Some(snapshot)) if !snapshot.exhaled => Sample::LowerBound {
            records: vec![record(snapshot, &loc, error, program, config)],
            bound: error.demanded,
        },
        // A failing specification exhale: compare the site's total demand
        // on the location against what the state held when it started.
        (QueryKind::Basic, Some(snapshot)) => {
            let failing_record = record(snapshot, &loc, error, program, config);
            let total = demanded_units(snapshot, &loc, hypothesis, error);
            let delta = error.held - total;
            debug!(total, delta, snapshot = %snapshot.instance.name(), "exhale deficit");
            if delta < -1 {
                // The site demands more than full permission; cap it.
                Sample::UpperBound {
                    record: failing_record,
                    bound: 1,
                }
            } else {
                Sample::Implication {
                    left: failing_record,
                    right: Box::new(Sample::LowerBound {
                        records: inhaled_records(&reached, &loc, error, program, config),
                        bound: total,
                    }),
                }
            }
        }
        // A failure in program code: the permission must come from the
        // specification sites inhaled on the path.
        (QueryKind::Basic, None) => Sample::LowerBound {
            records: inhaled_records(&reached, &loc, error, program, config),
            bound: error.demanded,
        },
    };
    Ok(sample)
}

fn record(
    snapshot: &Snapshot,
    loc: &ConcreteLoc,
    error: &VerificationError,
    program: &Program,
    config: &InferenceConfig,
) -> Record {
    let instance = &snapshot.instance;
    let locations = adapt(loc, instance, &error.model, program, config.extract_depth);
    let mut state = BTreeMap::new();
    for atom in &instance.placeholder().atoms {
        let at_site = instance.instantiate(atom);
        if let Some(Value::Bool(b)) = eval_pure(&at_site, &error.model) {
            state.insert(atom.to_string(), b);
        }
    }
    Record {
        kind: if snapshot.exhaled {
            RecordKind::Exhaled
        } else {
            RecordKind::Inhaled
        },
        instance: instance.clone(),
        abstraction: if state.is_empty() {
            Abstraction::Unknown
        } else {
            Abstraction::State(state)
        },
        locations,
    }
}

fn inhaled_records(
    reached: &BTreeMap<&str, &Snapshot>,
    loc: &ConcreteLoc,
    error: &VerificationError,
    program: &Program,
    config: &InferenceConfig,
) -> Vec<Record> {
    reached
        .values()
        .filter(|s| !s.exhaled)
        .map(|s| record(s, loc, error, program, config))
        .filter(|r| !r.locations.is_empty())
        .collect()
}

/// Units the failing site's whole body demands on the concrete location
/// under the model. Guarded conjuncts count only when their guard holds.
fn demanded_units(
    snapshot: &Snapshot,
    loc: &ConcreteLoc,
    hypothesis: &Hypothesis,
    error: &VerificationError,
) -> i64 {
    let Some(body) = hypothesis.body(snapshot.instance.name()) else {
        return error.demanded;
    };
    let body = snapshot.instance.instantiate(body);
    let mut total = 0;
    let mut stack = vec![&body];
    while let Some(expr) = stack.pop() {
        match expr {
            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => {
                stack.push(lhs);
                stack.push(rhs);
            }
            Expr::Binary {
                op: BinOp::Implies,
                lhs,
                rhs,
            } => {
                if eval_pure(lhs, &error.model) == Some(Value::Bool(true)) {
                    stack.push(rhs);
                }
            }
            Expr::Acc { loc: access, amount } => {
                if concretize(access, &error.model).as_ref() == Some(loc) {
                    total += *amount;
                }
            }
            _ => {}
        }
    }
    total.max(error.demanded)
}
