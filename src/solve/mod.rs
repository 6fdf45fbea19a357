//! Boolean/pseudo-boolean constraint model and the satisfiability seam.
//!
//! Sample constraints over template activation variables are collected into
//! a [`Formula`]; the [`Solver`] trait is the external-solver interface, and
//! [`SearchSolver`] is the built-in deterministic implementation.

mod formula;
mod solver;
#[cfg(test)]
mod tests;

pub use formula::{Assignment, Constraint, Formula, Term};
pub use solver::{SearchSolver, Solver, SolverConfig};
