//! The verification half of the CEGIS loop.
//!
//! An oracle takes a fully annotated query program (no placeholders, no
//! calls, no loops) and either passes it or reports the first verification
//! failure together with a concrete counterexample model. The built-in
//! [`SimOracle`] verifies by bounded enumeration of concrete heap shapes;
//! an SMT-backed verifier can be plugged in through the [`Oracle`] trait.

use std::collections::BTreeMap;
use std::fmt;

use crate::ir::{Expr, Program};

mod sim;
#[cfg(test)]
mod tests;

pub use sim::SimOracle;

/// A concrete runtime value in a counterexample model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Null,
    Ref(u32),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Ref(id) => write!(f, "ref{}", id),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Variable valuation at the failure point.
pub type Model = BTreeMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// An exhale, heap read, or heap write demanded more permission than
    /// the state held.
    InsufficientPermission,
    /// A pure assertion evaluated to false on exhale or assert.
    AssertionViolation,
}

/// The first failure the oracle found, with everything extraction needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationError {
    pub method: String,
    pub reason: FailureReason,
    /// The failing location or assertion as written in the query.
    pub location: Expr,
    /// Units the failing statement demanded.
    pub demanded: i64,
    /// Units the state held for the location at the failure.
    pub held: i64,
    /// Labels passed on the failing path, in execution order.
    pub labels: Vec<String>,
    /// The `info` tag of the enclosing inhale/exhale, if any.
    pub info: Option<u32>,
    pub model: Model,
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            FailureReason::InsufficientPermission => write!(
                f,
                "{}: insufficient permission for {} (demanded {}, held {})",
                self.method, self.location, self.demanded, self.held
            ),
            FailureReason::AssertionViolation => {
                write!(f, "{}: assertion {} failed", self.method, self.location)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(VerificationError),
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("query contains an unsupported statement: {0}")]
    Unsupported(String),
    #[error("ill-typed expression in query: {0}")]
    IllTyped(String),
    #[error("unknown identifier in query: {0}")]
    Unknown(String),
}

/// The verification seam of the CEGIS loop.
pub trait Oracle {
    fn verify(&mut self, program: &Program) -> Result<Verdict, OracleError>;
}
