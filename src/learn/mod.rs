//! The learner half of the CEGIS loop.
//!
//! The learner keeps an append-only corpus of permission samples, encodes it
//! against the current template set, and decodes solver models into candidate
//! hypotheses. When the corpus becomes unsatisfiable at the current
//! escalation level, the template space is widened until the configured
//! ceiling is reached.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::InferenceConfig;
use crate::infer::PlaceholderTable;
use crate::solve::Solver;

mod encode;
mod hypothesis;
mod sample;
mod template;
#[cfg(test)]
mod tests;

pub use encode::encode;
pub use hypothesis::{build_hypothesis, Hypothesis};
pub use sample::{Abstraction, Record, RecordKind, Sample};
pub use template::{EscalationLevel, Guard, GuardId, TemplateSet};

#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    #[error("no specification exists in the template space at escalation level {level}")]
    Unsatisfiable { level: usize },
    #[error("learner produced a previously seen hypothesis")]
    Duplicate,
}

/// Sample corpus, escalation state, and the solver seam.
pub struct Learner<S> {
    table: PlaceholderTable,
    solver: S,
    config: InferenceConfig,
    samples: Vec<Sample>,
    seen: BTreeSet<[u8; 32]>,
    level: usize,
    escalations: usize,
}

impl<S: Solver> Learner<S> {
    pub fn new(table: PlaceholderTable, solver: S, config: InferenceConfig) -> Self {
        Self {
            table,
            solver,
            config,
            samples: Vec::new(),
            seen: BTreeSet::new(),
            level: 0,
            escalations: 0,
        }
    }

    /// The corpus is append-only: samples describe ground truth about the
    /// program and never become stale.
    pub fn add_sample(&mut self, sample: Sample) {
        debug!(sample = %sample, "recording sample");
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn escalations(&self) -> usize {
        self.escalations
    }

    /// Produce the next hypothesis consistent with the corpus, escalating
    /// the template space as needed.
    pub fn hypothesis(&mut self) -> Result<Hypothesis, LearnError> {
        if self.config.de_escalate {
            self.level = 0;
        }
        loop {
            let templates = TemplateSet::new(&self.table, EscalationLevel::at(self.level));
            let formula = encode(&self.samples, &templates);
            match self.solver.solve(&formula) {
                Some(model) => {
                    let hypothesis = build_hypothesis(&model, &templates, &self.table);
                    if !self.seen.insert(*hypothesis.fingerprint().as_bytes()) {
                        return Err(LearnError::Duplicate);
                    }
                    return Ok(hypothesis);
                }
                None => {
                    if self.level >= self.config.max_escalations {
                        return Err(LearnError::Unsatisfiable { level: self.level });
                    }
                    self.level += 1;
                    self.escalations += 1;
                    info!(level = self.level, "escalating template space");
                }
            }
        }
    }
}
