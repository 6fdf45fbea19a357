//! Compiling checks and a hypothesis into self-contained oracle queries.
//!
//! A query is a program whose method bodies contain only primitives the
//! oracle executes directly: specification sites become labeled
//! inhale/exhale sequences, calls become exhale/havoc/inhale at the callee's
//! contract, and loop boundaries were already cut out during preprocessing.

use std::collections::BTreeMap;

use crate::infer::{Input, Instance};
use crate::ir::Program;
use crate::learn::Hypothesis;

mod builder;
mod folding;
#[cfg(test)]
mod tests;

pub use builder::{basic_queries, framing_query};

use crate::config::InferenceConfig;

/// Everything the builder needs for one CEGIS round.
pub struct QueryContext<'a> {
    pub input: &'a Input,
    pub hypothesis: &'a Hypothesis,
    pub config: &'a InferenceConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// Each placeholder body inhaled in isolation: catches conjuncts that
    /// read locations their own specification has not yet framed.
    Framing,
    /// The instrumented checks.
    Basic,
}

/// One specification site instrumented into the query. The snapshot index
/// doubles as the `info` tag on its inhale/exhale statements, and the label
/// statement ahead of them records reachability.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub label: String,
    pub instance: Instance,
    /// True when the site exhales (consumes) the specification.
    pub exhaled: bool,
}

#[derive(Clone, Debug)]
pub struct Query {
    pub kind: QueryKind,
    pub program: Program,
    pub snapshots: Vec<Snapshot>,
}

impl Query {
    /// The snapshot an oracle `info` tag refers to.
    pub fn snapshot(&self, info: u32) -> Option<&Snapshot> {
        self.snapshots.get(info as usize)
    }

    /// Snapshots whose labels were passed on the failing path, keyed by
    /// label.
    pub fn reached<'a>(&'a self, labels: &[String]) -> BTreeMap<&'a str, &'a Snapshot> {
        self.snapshots
            .iter()
            .filter(|s| labels.iter().any(|l| l == &s.label))
            .map(|s| (s.label.as_str(), s))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("no placeholder named `{0}`")]
    UnknownPlaceholder(String),
    #[error("no hypothesis body for placeholder `{0}`")]
    MissingBody(String),
}
