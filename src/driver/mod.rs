//! The CEGIS round loop tying the learner and the oracle together.
//!
//! Each round the learner proposes a hypothesis, the query builder compiles
//! it into oracle programs, and the first verification failure is turned
//! into a sample for the next round. The loop ends when every query passes,
//! when the template space is exhausted, or when the learner repeats itself.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::InferenceConfig;
use crate::extract::{extract, ExtractError};
use crate::infer::{Input, PlaceholderTable};
use crate::ir::{Block, Expr, Program, SpecClause, Stmt};
use crate::learn::{Hypothesis, LearnError, Learner, Sample};
use crate::oracle::{Oracle, OracleError, Verdict};
use crate::query::{basic_queries, framing_query, QueryContext, QueryError};
use crate::solve::Solver;

#[cfg(test)]
mod tests;

/// Counters reported alongside the inference outcome.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct Stats {
    pub rounds: usize,
    pub oracle_calls: usize,
    pub escalations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("no specification exists within the template space (escalation level {level})")]
    NoHypothesis { level: usize },
    #[error("inference stopped making progress on a repeated hypothesis")]
    DuplicateHypothesis,
    #[error(transparent)]
    Undecodable(#[from] ExtractError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// A verified specification: the input program with every `?` replaced by
/// the inferred conjuncts.
#[derive(Clone, Debug)]
pub struct Inferred {
    pub program: Program,
    pub hypothesis: Hypothesis,
    pub stats: Stats,
}

pub struct Driver<O, S> {
    input: Input,
    oracle: O,
    learner: Learner<S>,
    config: InferenceConfig,
    stats: Stats,
}

impl<O: Oracle, S: Solver> Driver<O, S> {
    pub fn new(input: Input, oracle: O, solver: S, config: InferenceConfig) -> Self {
        let learner = Learner::new(input.table.clone(), solver, config.clone());
        Self {
            input,
            oracle,
            learner,
            config,
            stats: Stats::default(),
        }
    }

    pub fn run(mut self) -> Result<Inferred, InferenceError> {
        loop {
            let hypothesis = match self.learner.hypothesis() {
                Ok(hypothesis) => hypothesis,
                Err(LearnError::Unsatisfiable { level }) => {
                    return Err(InferenceError::NoHypothesis { level });
                }
                Err(LearnError::Duplicate) => return Err(InferenceError::DuplicateHypothesis),
            };
            self.stats.rounds += 1;
            self.stats.escalations = self.learner.escalations();
            debug!(round = self.stats.rounds, "proposed hypothesis");
            match self.round(&hypothesis)? {
                Some(sample) => self.learner.add_sample(sample),
                None => {
                    info!(rounds = self.stats.rounds, "specification verified");
                    let program = annotate(&self.input.program, &self.input.table, &hypothesis);
                    return Ok(Inferred {
                        program,
                        hypothesis,
                        stats: self.stats,
                    });
                }
            }
        }
    }

    /// One verification round: the framing query first, then the basic
    /// queries.
    /// Returns the sample extracted from the first failure, or `None` when
    /// everything passes.
    fn round(&mut self, hypothesis: &Hypothesis) -> Result<Option<Sample>, InferenceError> {
        let ctx = QueryContext {
            input: &self.input,
            hypothesis,
            config: &self.config,
        };
        let mut queries = vec![framing_query(&ctx)?];
        queries.extend(basic_queries(&ctx)?);
        for query in &queries {
            self.stats.oracle_calls += 1;
            if let Verdict::Fail(error) = self.oracle.verify(&query.program)? {
                debug!(%error, "query failed");
                let sample = extract(query, &self.input.program, hypothesis, &error, &self.config)?;
                return Ok(Some(sample));
            }
        }
        Ok(None)
    }
}

/// Replace every `?` clause in the program with the inferred conjuncts of
/// the corresponding placeholder.
pub fn annotate(program: &Program, table: &PlaceholderTable, hypothesis: &Hypothesis) -> Program {
    let mut out = program.clone();
    for method in &mut out.methods {
        let pre = format!("pre_{}", method.name);
        let post = format!("post_{}", method.name);
        splice(&mut method.requires, &pre, table, hypothesis);
        splice(&mut method.ensures, &post, table, hypothesis);
        let name = method.name.clone();
        if let Some(body) = &mut method.body {
            let mut index = 0;
            annotate_block(body, &name, &mut index, table, hypothesis);
        }
    }
    out
}

// Loop indices follow the preprocessing order: outer loops before the loops
// nested inside them.
fn annotate_block(
    block: &mut Block,
    method: &str,
    index: &mut usize,
    table: &PlaceholderTable,
    hypothesis: &Hypothesis,
) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::While {
                invariants, body, ..
            } => {
                let name = format!("inv_{}_{}", method, *index);
                *index += 1;
                splice(invariants, &name, table, hypothesis);
                annotate_block(body, method, index, table, hypothesis);
            }
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                annotate_block(then_block, method, index, table, hypothesis);
                if let Some(block) = else_block {
                    annotate_block(block, method, index, table, hypothesis);
                }
            }
            _ => {}
        }
    }
}

/// Swap the `?` clause for the hypothesis conjuncts the user did not
/// already write. A hypothesis with nothing to add drops the clause.
fn splice(
    clauses: &mut Vec<SpecClause>,
    name: &str,
    table: &PlaceholderTable,
    hypothesis: &Hypothesis,
) {
    if !clauses.contains(&SpecClause::Placeholder) {
        return;
    }
    let inferred: Vec<Expr> = match (table.get(name), hypothesis.body(name)) {
        (Some(placeholder), Some(body)) => body
            .conjuncts()
            .into_iter()
            .filter(|c| !c.is_true() && !placeholder.existing.contains(*c))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    let mut out = Vec::with_capacity(clauses.len() + inferred.len());
    let mut spliced = false;
    for clause in clauses.drain(..) {
        match clause {
            SpecClause::Placeholder if !spliced => {
                spliced = true;
                out.extend(inferred.iter().cloned().map(SpecClause::Expr));
            }
            SpecClause::Placeholder => {}
            other => out.push(other),
        }
    }
    *clauses = out;
}
