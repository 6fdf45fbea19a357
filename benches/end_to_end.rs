//! End-to-end inference latency.
//!
//! Covers the two costs that dominate in practice: the full CEGIS loop on
//! small programs (oracle enumeration plus learning) and the template
//! solver on its own.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sepsynth::solve::{Constraint, Formula, SearchSolver, Solver, Term};
use sepsynth::InferenceConfig;

const FIELD_WRITE: &str = "field f: Int\n\
                           method set(x: Ref) requires ? ensures ? { x.f := 1 }\n";

const ALIASED_CALL: &str = "field f: Int\n\
                            method copy(a: Ref, b: Ref) requires ?\n\
                            {\n\
                              a.f := 1\n\
                              b.f := 2\n\
                            }\n\
                            method share(x: Ref) requires ? { copy(x, x) }\n";

const LOOP: &str = "field f: Int\n\
                    method fill(x: Ref, n: Int) requires ? ensures ?\n\
                    {\n\
                      var i: Int := 0\n\
                      while (i < n)\n\
                        invariant ?\n\
                      {\n\
                        x.f := i\n\
                        i := i + 1\n\
                      }\n\
                    }\n";

fn bench_inference(c: &mut Criterion) {
    let config = InferenceConfig::default();
    c.bench_function("infer_field_write", |b| {
        b.iter(|| sepsynth::infer_source(black_box(FIELD_WRITE), &config).unwrap())
    });
    c.bench_function("infer_aliased_call", |b| {
        b.iter(|| sepsynth::infer_source(black_box(ALIASED_CALL), &config).unwrap())
    });
    c.bench_function("infer_loop_invariant", |b| {
        b.iter(|| sepsynth::infer_source(black_box(LOOP), &config).unwrap())
    });
}

/// A synthetic corpus in the shape the learner produces: sum bounds over
/// guard activation variables plus conditional constraints.
fn synthetic_formula(guards: usize) -> Formula {
    let mut formula = Formula::default();
    let vars: Vec<String> = (0..guards).map(|g| format!("c-{}-0", g)).collect();
    formula.push(Constraint::SumGe {
        terms: vars.iter().map(|v| Term::var(v)).collect(),
        bound: (guards / 2) as i64,
    });
    formula.push(Constraint::SumLe {
        terms: vars.iter().map(|v| Term::var(v)).collect(),
        bound: (guards / 2) as i64,
    });
    for pair in vars.chunks(2) {
        if let [a, b] = pair {
            formula.push(Constraint::When {
                cond: Term::var(a),
                then: Box::new(Constraint::Bool(Term::not(Term::var(b)))),
            });
        }
    }
    formula
}

fn bench_solver(c: &mut Criterion) {
    let formula = synthetic_formula(16);
    c.bench_function("solver_sum_bounds_16", |b| {
        b.iter(|| {
            let mut solver = SearchSolver::default();
            solver.solve(black_box(&formula)).unwrap()
        })
    });
}

criterion_group!(benches, bench_inference, bench_solver);
criterion_main!(benches);
