pub mod config;
pub mod diagnostic;
pub mod driver;
pub mod extract;
pub mod infer;
pub mod ir;
pub mod learn;
pub mod oracle;
pub mod query;
pub mod solve;
pub mod syntax;

// Public API surface: `sepsynth::infer_source()` and friends.
pub use config::{BatchMode, ConsolidationMode, InferenceConfig};
pub use driver::{annotate, Driver, Inferred, InferenceError, Stats};
pub use syntax::parse;

use std::path::Path;

use diagnostic::Diagnostic;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the input program is malformed")]
    Invalid(Vec<Diagnostic>),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Infer specifications for a source string using the built-in oracle and
/// solver.
pub fn infer_source(source: &str, config: &InferenceConfig) -> Result<Inferred, Error> {
    let program = syntax::parse(source).map_err(Error::Invalid)?;
    let input = infer::preprocess(program).map_err(Error::Invalid)?;
    let driver = Driver::new(
        input,
        oracle::SimOracle::new(),
        solve::SearchSolver::default(),
        config.clone(),
    );
    Ok(driver.run()?)
}

pub fn infer_file(path: &Path, config: &InferenceConfig) -> Result<Inferred, Error> {
    let source = std::fs::read_to_string(path)?;
    infer_source(&source, config)
}
