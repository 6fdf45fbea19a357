use super::*;
use crate::oracle::SimOracle;
use crate::solve::SearchSolver;
use crate::syntax::parse;

fn infer(source: &str) -> Result<Inferred, InferenceError> {
    let input = crate::infer::preprocess(parse(source).unwrap()).unwrap();
    Driver::new(
        input,
        SimOracle::new(),
        SearchSolver::default(),
        InferenceConfig::default(),
    )
    .run()
}

fn body(inferred: &Inferred, name: &str) -> String {
    inferred.hypothesis.body(name).unwrap().to_string()
}

#[test]
fn infers_field_precondition() {
    let inferred = infer(
        "field f: Int\n\
         method set(x: Ref) requires ? ensures ? { x.f := 1 }\n",
    )
    .unwrap();
    assert_eq!(body(&inferred, "pre_set"), "acc(x.f)");
    assert_eq!(inferred.stats.rounds, 2);
    assert_eq!(inferred.stats.escalations, 0);

    let rendered = inferred.program.to_string();
    assert!(rendered.contains("requires acc(x.f)"));
    assert!(!rendered.contains('?'));
}

#[test]
fn fully_specified_program_passes_in_one_round() {
    let source = "field f: Int\n\
                  method get(x: Ref) requires acc(x.f) ensures acc(x.f) { x.f := 0 }\n";
    let inferred = infer(source).unwrap();
    assert_eq!(inferred.stats.rounds, 1);
    // Nothing to splice; the program renders back unchanged.
    assert_eq!(
        inferred.program.to_string(),
        parse(source).unwrap().to_string()
    );
}

#[test]
fn aliasing_forces_a_guarded_specification() {
    let inferred = infer(
        "field f: Int\n\
         method copy(a: Ref, b: Ref) requires ?\n\
         {\n\
           a.f := 1\n\
           b.f := 2\n\
         }\n\
         method share(x: Ref) requires ? { copy(x, x) }\n",
    )
    .unwrap();
    // Unconditional permission to both cells over-demands under a == b, so
    // the template space widens exactly once and one access gets a guard.
    assert_eq!(inferred.stats.escalations, 1);
    let copy_pre = body(&inferred, "pre_copy");
    assert!(copy_pre.contains("==>"), "got {}", copy_pre);
    assert!(copy_pre.contains("acc(a.f)"));
    assert!(copy_pre.contains("acc(b.f)"));
    assert_eq!(body(&inferred, "pre_share"), "acc(x.f)");
}

#[test]
fn over_demanding_contract_fails() {
    // The callee's written precondition asks for two full units of one
    // cell; no inferable caller specification can supply that.
    let result = infer(
        "field f: Int\n\
         method callee(a: Ref) requires acc(a.f, 2)\n\
         method caller(x: Ref) requires ? { callee(x) }\n",
    );
    assert!(matches!(result, Err(InferenceError::DuplicateHypothesis)));
}

#[test]
fn infers_loop_invariant() {
    let inferred = infer(
        "field f: Int\n\
         method fill(x: Ref, n: Int) requires ? ensures ?\n\
         {\n\
           var i: Int := 0\n\
           while (i < n)\n\
             invariant ?\n\
           {\n\
             x.f := i\n\
             i := i + 1\n\
           }\n\
         }\n",
    )
    .unwrap();
    assert_eq!(body(&inferred, "inv_fill_0"), "acc(x.f)");
    assert_eq!(body(&inferred, "pre_fill"), "acc(x.f)");
    assert!(inferred.program.to_string().contains("invariant acc(x.f)"));
}

#[test]
fn folds_into_a_written_predicate_contract() {
    // The inferred field permission is folded into the callee's predicate
    // at the call site.
    let inferred = infer(
        "field next: Ref\n\
         predicate list(this: Ref) { acc(this.next) }\n\
         method consume(a: Ref) requires acc(list(a))\n\
         method wipe(x: Ref) requires ?\n\
         {\n\
           x.next := null\n\
           consume(x)\n\
         }\n",
    )
    .unwrap();
    assert_eq!(body(&inferred, "pre_wipe"), "acc(x.next)");
}

#[test]
fn unfolds_a_written_predicate_for_a_callee() {
    // The written predicate is unfolded on inhale, so the callee's field
    // demand is already covered and the `?` site adds nothing.
    let inferred = infer(
        "field next: Ref\n\
         predicate list(this: Ref) { acc(this.next) }\n\
         method init(a: Ref) requires ? { a.next := null }\n\
         method start(x: Ref) requires acc(list(x)) requires ? { init(x) }\n",
    )
    .unwrap();
    assert_eq!(body(&inferred, "pre_init"), "acc(a.next)");
    assert_eq!(body(&inferred, "pre_start"), "acc(list(x))");
}
