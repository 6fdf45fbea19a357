//! Permission samples extracted from verification failures.
//!
//! Samples constrain how much permission placeholder instances may carry for
//! a concrete heap location. They are expressed against [`Record`]s: one
//! record per placeholder instance whose specification touched the location,
//! together with the boolean state its atoms had at the failure.

use std::collections::BTreeMap;
use std::fmt;

use crate::infer::Instance;
use crate::ir::Expr;

/// Whether the recorded instance added or removed permission at its site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Inhaled,
    Exhaled,
}

/// The truth state of a placeholder's atoms at one program point, keyed by
/// the atom's canonical rendered form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Abstraction {
    State(BTreeMap<String, bool>),
    /// No model was available; every atom is undetermined.
    Unknown,
}

impl Abstraction {
    pub fn evaluate(&self, atom_key: &str) -> Option<bool> {
        match self {
            Abstraction::State(map) => map.get(atom_key).copied(),
            Abstraction::Unknown => None,
        }
    }
}

/// One placeholder instance's view of the failing location.
#[derive(Clone, Debug)]
pub struct Record {
    pub kind: RecordKind,
    pub instance: Instance,
    pub abstraction: Abstraction,
    /// The failing location adapted into the placeholder's vocabulary.
    /// Aliasing can yield more than one candidate; any matching guard
    /// contributes.
    pub locations: Vec<Expr>,
}

impl Record {
    /// Does this record touch the guard resource with the given key?
    pub fn touches(&self, resource_key: &str) -> bool {
        self.locations.iter().any(|l| l.to_string() == resource_key)
    }
}

/// A constraint over the summed permission contributions of records.
#[derive(Clone, Debug)]
pub enum Sample {
    /// The records together must contribute at least `bound` units.
    LowerBound { records: Vec<Record>, bound: i64 },
    /// The record must contribute at most `bound` units.
    UpperBound { record: Record, bound: i64 },
    /// `right` binds only if `left` contributes any permission.
    Implication { left: Record, right: Box<Sample> },
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::LowerBound { records, bound } => {
                write!(f, "lower({}; >= {})", names(records), bound)
            }
            Sample::UpperBound { record, bound } => {
                write!(f, "upper({}; <= {})", record.instance.name(), bound)
            }
            Sample::Implication { left, right } => {
                write!(f, "{} => {}", left.instance.name(), right)
            }
        }
    }
}

fn names(records: &[Record]) -> String {
    records
        .iter()
        .map(|r| r.instance.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
