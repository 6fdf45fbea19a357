use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sepsynth::diagnostic::render_diagnostics;
use sepsynth::infer::preprocess;
use sepsynth::ir::Expr;
use sepsynth::learn::Hypothesis;
use sepsynth::oracle::{Oracle, SimOracle, Verdict};
use sepsynth::query::{basic_queries, framing_query, QueryContext};
use sepsynth::{BatchMode, ConsolidationMode, Error, InferenceConfig, Inferred, Stats};

#[derive(Parser)]
#[command(
    name = "sepsynth",
    version,
    about = "Inference of separation-logic specifications by example"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Infer the `?` specification sites of a program
    Infer {
        /// Input program
        input: PathBuf,
        /// Write the annotated program here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save an inference report to a JSON file
        #[arg(long, value_name = "PATH")]
        save_report: Option<PathBuf>,
        /// Maximum number of template escalations
        #[arg(long, default_value_t = 3)]
        max_escalations: usize,
        /// Reset the escalation level after each accepted hypothesis
        #[arg(long)]
        de_escalate: bool,
        /// Predicate unfolding depth after inhales
        #[arg(long, default_value_t = 1)]
        unfold_depth: usize,
        /// Predicate folding depth before exhales
        #[arg(long, default_value_t = 1)]
        fold_depth: usize,
        /// Predicate recursion depth during failure extraction
        #[arg(long, default_value_t = 2)]
        extract_depth: usize,
        /// Branch on pairwise aliasing of reference parameters
        #[arg(long)]
        branching: bool,
        /// Heap consolidation mode
        #[arg(long, value_enum, default_value = "off")]
        consolidation: ConsolidationMode,
        /// Query batching mode
        #[arg(long, value_enum, default_value = "together")]
        batch: BatchMode,
    },
    /// Verify a fully specified program (no `?` sites)
    Check {
        /// Input program
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    program: String,
    specifications: BTreeMap<&'a str, String>,
    stats: Stats,
    config: &'a InferenceConfig,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Infer {
            input,
            output,
            save_report,
            max_escalations,
            de_escalate,
            unfold_depth,
            fold_depth,
            extract_depth,
            branching,
            consolidation,
            batch,
        } => {
            let config = InferenceConfig {
                max_escalations,
                de_escalate,
                unfold_depth,
                fold_depth,
                extract_depth,
                branching,
                consolidation,
                batch,
            };
            cmd_infer(input, output, save_report, config);
        }
        Command::Check { input } => cmd_check(input),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_infer(
    input: PathBuf,
    output: Option<PathBuf>,
    save_report: Option<PathBuf>,
    config: InferenceConfig,
) {
    let source = read_source(&input);
    let inferred = match sepsynth::infer_source(&source, &config) {
        Ok(inferred) => inferred,
        Err(Error::Invalid(diagnostics)) => {
            render_diagnostics(&diagnostics, &input.display().to_string(), &source);
            process::exit(1);
        }
        Err(error) => {
            eprintln!("error: {}", error);
            process::exit(1);
        }
    };

    let annotated = inferred.program.to_string();
    match output {
        Some(path) => {
            if let Err(error) = std::fs::write(&path, &annotated) {
                eprintln!("error: cannot write '{}': {}", path.display(), error);
                process::exit(1);
            }
        }
        None => print!("{}", annotated),
    }

    eprintln!(
        "inferred {} specification(s) in {} round(s) ({} oracle calls, {} escalations)",
        inferred.hypothesis.predicates.len(),
        inferred.stats.rounds,
        inferred.stats.oracle_calls,
        inferred.stats.escalations,
    );

    if let Some(path) = save_report {
        if let Err(error) = write_report(&path, &inferred, &config, annotated) {
            eprintln!("error: cannot write '{}': {}", path.display(), error);
            process::exit(1);
        }
    }
}

fn write_report(
    path: &PathBuf,
    inferred: &Inferred,
    config: &InferenceConfig,
    program: String,
) -> std::io::Result<()> {
    let report = Report {
        program,
        specifications: inferred
            .hypothesis
            .predicates
            .iter()
            .map(|(name, body)| (name.as_str(), body.to_string()))
            .collect(),
        stats: inferred.stats,
        config,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)
}

fn cmd_check(input: PathBuf) {
    let source = read_source(&input);
    let filename = input.display().to_string();
    let program = match sepsynth::parse(&source) {
        Ok(program) => program,
        Err(diagnostics) => {
            render_diagnostics(&diagnostics, &filename, &source);
            process::exit(1);
        }
    };
    let input = match preprocess(program) {
        Ok(input) => input,
        Err(diagnostics) => {
            render_diagnostics(&diagnostics, &filename, &source);
            process::exit(1);
        }
    };
    if let Some(open) = input.table.iter().find(|p| !p.fixed) {
        eprintln!(
            "error: `{}` has an unresolved `?` site; run `sepsynth infer` first",
            open.name
        );
        process::exit(1);
    }

    // The written specifications, taken at face value.
    let hypothesis = Hypothesis {
        predicates: input
            .table
            .iter()
            .map(|p| (p.name.clone(), Expr::and_all(p.existing.clone())))
            .collect(),
        lemmas: Vec::new(),
    };
    let config = InferenceConfig::default();
    let ctx = QueryContext {
        input: &input,
        hypothesis: &hypothesis,
        config: &config,
    };
    let mut queries = match framing_query(&ctx) {
        Ok(query) => vec![query],
        Err(error) => {
            eprintln!("error: {}", error);
            process::exit(1);
        }
    };
    match basic_queries(&ctx) {
        Ok(more) => queries.extend(more),
        Err(error) => {
            eprintln!("error: {}", error);
            process::exit(1);
        }
    }

    let mut oracle = SimOracle::new();
    for query in &queries {
        match oracle.verify(&query.program) {
            Ok(Verdict::Pass) => {}
            Ok(Verdict::Fail(error)) => {
                eprintln!("verification failed: {}", error);
                process::exit(1);
            }
            Err(error) => {
                eprintln!("error: {}", error);
                process::exit(1);
            }
        }
    }
    eprintln!("ok: {} check(s) verified", input.checks.len());
}

fn read_source(path: &PathBuf) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: cannot read '{}': {}", path.display(), error);
            process::exit(1);
        }
    }
}
