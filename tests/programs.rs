use std::io::Write;

use sepsynth::{Error, InferenceConfig, InferenceError};

fn infer(source: &str) -> sepsynth::Inferred {
    sepsynth::infer_source(source, &InferenceConfig::default()).unwrap()
}

fn body(inferred: &sepsynth::Inferred, name: &str) -> String {
    inferred.hypothesis.body(name).unwrap().to_string()
}

// ── single method ──

#[test]
fn annotates_a_field_write() {
    let inferred = infer(
        "field f: Int\n\
         method set(x: Ref) requires ? ensures ? { x.f := 1 }\n",
    );
    insta::assert_snapshot!(inferred.program.to_string(), @r"
    field f: Int

    method set(x: Ref)
      requires acc(x.f)
    {
      x.f := 1
    }
    ");
}

#[test]
fn branch_still_demands_the_written_cell() {
    let inferred = infer(
        "field f: Int\n\
         method maybe(x: Ref, c: Bool) requires ?\n\
         {\n\
           if (c) { x.f := 1 }\n\
         }\n",
    );
    assert_eq!(body(&inferred, "pre_maybe"), "acc(x.f)");
}

// ── calls ──

#[test]
fn permission_demand_propagates_to_the_caller() {
    let inferred = infer(
        "field f: Int\n\
         method callee(a: Ref) requires ? ensures ? { a.f := 0 }\n\
         method caller(x: Ref) requires ? ensures ? { callee(x) }\n",
    );
    assert_eq!(body(&inferred, "pre_callee"), "acc(a.f)");
    assert_eq!(body(&inferred, "pre_caller"), "acc(x.f)");
}

#[test]
fn aliased_call_needs_a_conditional_specification() {
    let inferred = infer(
        "field f: Int\n\
         method copy(a: Ref, b: Ref) requires ?\n\
         {\n\
           a.f := 1\n\
           b.f := 2\n\
         }\n\
         method share(x: Ref) requires ? { copy(x, x) }\n",
    );
    assert_eq!(inferred.stats.escalations, 1);
    assert!(body(&inferred, "pre_copy").contains("==>"));
}

// ── loops ──

#[test]
fn loop_invariant_carries_the_frame() {
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
    );
    let rendered = inferred.program.to_string();
    assert!(rendered.contains("requires acc(x.f)"));
    assert!(rendered.contains("invariant acc(x.f)"));
    assert!(!rendered.contains('?'));
}

// ── failure modes ──

#[test]
fn over_demanding_written_contract_is_rejected() {
    let result = sepsynth::infer_source(
        "field f: Int\n\
         method callee(a: Ref) requires acc(a.f, 2)\n\
         method caller(x: Ref) requires ? { callee(x) }\n",
        &InferenceConfig::default(),
    );
    assert!(matches!(
        result,
        Err(Error::Inference(InferenceError::DuplicateHypothesis))
    ));
}

#[test]
fn malformed_programs_are_reported() {
    let result = sepsynth::infer_source(
        "method m(x: Ref) requires ? { unknown(x) }\n",
        &InferenceConfig::default(),
    );
    assert!(matches!(result, Err(Error::Invalid(_))));
}

// ── file API ──

#[test]
fn infers_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "field f: Int\n\
         method set(x: Ref) requires ? {{ x.f := 1 }}\n"
    )
    .unwrap();
    let inferred = sepsynth::infer_file(file.path(), &InferenceConfig::default()).unwrap();
    assert_eq!(body(&inferred, "pre_set"), "acc(x.f)");
}

#[test]
fn missing_files_surface_io_errors() {
    let result = sepsynth::infer_file(
        std::path::Path::new("/nonexistent/program"),
        &InferenceConfig::default(),
    );
    assert!(matches!(result, Err(Error::Io(_))));
}
