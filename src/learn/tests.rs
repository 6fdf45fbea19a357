use std::collections::BTreeMap;

use super::*;
use crate::config::InferenceConfig;
use crate::infer::{preprocess, Input, Instance};
use crate::ir::Expr;
use crate::solve::SearchSolver;
use crate::syntax::parse;

fn input() -> Input {
    let program = parse(
        "field f: Int\n\
         method m(x: Ref) requires ? ensures ? { x.f := 0 }\n",
    )
    .unwrap();
    preprocess(program).unwrap()
}

fn learner(input: &Input) -> Learner<SearchSolver> {
    Learner::new(
        input.table.clone(),
        SearchSolver::default(),
        InferenceConfig::default(),
    )
}

fn record(input: &Input, name: &str, atoms: &[(&str, bool)], loc: &str) -> Record {
    let placeholder = input.placeholder(name).unwrap().clone();
    let state: BTreeMap<String, bool> = atoms
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    let location = placeholder
        .resources
        .iter()
        .find(|r| r.to_string() == loc)
        .unwrap()
        .clone();
    Record {
        kind: RecordKind::Exhaled,
        instance: Instance::identity(placeholder),
        abstraction: Abstraction::State(state),
        locations: vec![location],
    }
}

#[test]
fn first_hypothesis_is_empty() {
    let input = input();
    let mut learner = learner(&input);
    let hypothesis = learner.hypothesis().unwrap();
    assert_eq!(hypothesis.body("pre_m").unwrap(), &Expr::Bool(true));
    assert_eq!(hypothesis.body("post_m").unwrap(), &Expr::Bool(true));
    assert_eq!(learner.level(), 0);
}

#[test]
fn lower_bound_grants_permission() {
    let input = input();
    let mut learner = learner(&input);
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[("x != null", true)], "x.f")],
        bound: 1,
    });
    let hypothesis = learner.hypothesis().unwrap();
    assert_eq!(hypothesis.body("pre_m").unwrap().to_string(), "acc(x.f)");
    // Nothing forced the postcondition, so it stays empty.
    assert_eq!(hypothesis.body("post_m").unwrap(), &Expr::Bool(true));
    assert_eq!(learner.level(), 0);
}

#[test]
fn duplicate_hypothesis_is_detected() {
    let input = input();
    let mut learner = learner(&input);
    learner.hypothesis().unwrap();
    // Same corpus, same model, no progress.
    assert!(matches!(learner.hypothesis(), Err(LearnError::Duplicate)));
}

#[test]
fn corpus_is_append_only() {
    let input = input();
    let mut learner = learner(&input);
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[], "x.f")],
        bound: 1,
    });
    learner.add_sample(Sample::UpperBound {
        record: record(&input, "post_m", &[], "x.f"),
        bound: 1,
    });
    assert_eq!(learner.samples().len(), 2);
}

#[test]
fn conflicting_bounds_force_a_guard() {
    let input = input();
    let mut learner = learner(&input);
    // Under `x == null` the precondition must not hold the permission,
    // under `x != null` it must: only a guarded template fits.
    learner.add_sample(Sample::UpperBound {
        record: record(&input, "pre_m", &[("x != null", false)], "x.f"),
        bound: 0,
    });
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[("x != null", true)], "x.f")],
        bound: 1,
    });
    let hypothesis = learner.hypothesis().unwrap();
    assert_eq!(
        hypothesis.body("pre_m").unwrap().to_string(),
        "(x != null) ==> acc(x.f)"
    );
    assert_eq!(learner.level(), 1);
    assert_eq!(learner.escalations(), 1);
}

#[test]
fn exhausted_escalation_reports_unsatisfiable() {
    let input = input();
    let mut learner = learner(&input);
    // A demand of two units can never be met: full permission is one unit
    // and the template grants each resource at most once.
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[("x != null", true)], "x.f")],
        bound: 2,
    });
    match learner.hypothesis() {
        Err(LearnError::Unsatisfiable { level }) => assert_eq!(level, 3),
        other => panic!("expected unsat, got {:?}", other.map(|h| h.predicates)),
    }
    assert_eq!(learner.escalations(), 3);
}

#[test]
fn implication_sample_binds_conditionally() {
    let input = input();
    let mut learner = learner(&input);
    // If the precondition holds the location, the postcondition must give
    // it back.
    learner.add_sample(Sample::Implication {
        left: record(&input, "pre_m", &[("x != null", true)], "x.f"),
        right: Box::new(Sample::LowerBound {
            records: vec![record(&input, "post_m", &[("x != null", true)], "x.f")],
            bound: 1,
        }),
    });
    // Nothing forces the precondition on, so the minimal model leaves both
    // sides empty.
    let hypothesis = learner.hypothesis().unwrap();
    assert_eq!(hypothesis.body("pre_m").unwrap(), &Expr::Bool(true));
    assert_eq!(hypothesis.body("post_m").unwrap(), &Expr::Bool(true));

    // Once the precondition is forced to hold it, the implication fires.
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[("x != null", true)], "x.f")],
        bound: 1,
    });
    let hypothesis = learner.hypothesis().unwrap();
    assert_eq!(hypothesis.body("pre_m").unwrap().to_string(), "acc(x.f)");
    assert_eq!(hypothesis.body("post_m").unwrap().to_string(), "acc(x.f)");
}

#[test]
fn fingerprint_tracks_content() {
    let input = input();
    let mut learner = learner(&input);
    let empty = learner.hypothesis().unwrap();
    learner.add_sample(Sample::LowerBound {
        records: vec![record(&input, "pre_m", &[], "x.f")],
        bound: 1,
    });
    let granted = learner.hypothesis().unwrap();
    assert_ne!(empty.fingerprint(), granted.fingerprint());
}
