use tracing::debug;

use super::formula::{Assignment, Formula};

/// External-solver seam: anything that can produce a satisfying assignment
/// for a formula, or report unsatisfiability as `None`.
pub trait Solver {
    fn solve(&mut self, formula: &Formula) -> Option<Assignment>;
}

/// Configuration for the built-in backtracking solver.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Upper bound on explored search nodes before giving up (treated as
    /// unsatisfiable; logged when hit).
    pub max_steps: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: 1 << 22,
        }
    }
}

/// Deterministic backtracking search over the formula's variables.
///
/// Variables are branched in sorted order, `false` first, so the first model
/// found activates as few clauses and literals as possible. Constraints are
/// checked with three-valued evaluation at every node; a definitely violated
/// constraint prunes the subtree.
pub struct SearchSolver {
    config: SolverConfig,
    steps: u64,
}

impl SearchSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config, steps: 0 }
    }

    fn search(
        &mut self,
        formula: &Formula,
        vars: &[String],
        index: usize,
        assignment: &mut Assignment,
    ) -> bool {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return false;
        }

        let mut all_satisfied = true;
        for constraint in &formula.constraints {
            match constraint.eval_partial(assignment) {
                Some(false) => return false,
                Some(true) => {}
                None => all_satisfied = false,
            }
        }
        if all_satisfied {
            // Complete the assignment deterministically.
            for var in &vars[index..] {
                assignment.insert(var.clone(), false);
            }
            return true;
        }
        if index >= vars.len() {
            return false;
        }

        let var = vars[index].clone();
        for value in [false, true] {
            assignment.insert(var.clone(), value);
            if self.search(formula, vars, index + 1, assignment) {
                return true;
            }
        }
        assignment.remove(&var);
        false
    }
}

impl Default for SearchSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver for SearchSolver {
    fn solve(&mut self, formula: &Formula) -> Option<Assignment> {
        self.steps = 0;
        let vars: Vec<String> = formula.variables().into_iter().collect();
        let mut assignment = Assignment::new();
        let found = self.search(formula, &vars, 0, &mut assignment);
        if self.steps > self.config.max_steps {
            debug!(steps = self.steps, "solver step budget exhausted");
        }
        if found {
            Some(assignment)
        } else {
            None
        }
    }
}
