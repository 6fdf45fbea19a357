use super::*;
use crate::ir::{Block, Expr, Method, Param, Stmt, Type};
use crate::syntax::parse;

fn verify(source: &str) -> Verdict {
    let program = parse(source).unwrap();
    SimOracle::new().verify(&program).unwrap()
}

fn expect_failure(source: &str) -> VerificationError {
    match verify(source) {
        Verdict::Fail(error) => error,
        Verdict::Pass => panic!("expected a verification failure"),
    }
}

#[test]
fn sufficient_permission_passes() {
    let verdict = verify(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           inhale acc(x.f)\n\
           x.f := 1\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn write_without_permission_fails() {
    let error = expect_failure(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           x.f := 1\n\
         }\n",
    );
    assert_eq!(error.reason, FailureReason::InsufficientPermission);
    assert_eq!(error.location.to_string(), "x.f");
    assert_eq!(error.demanded, 1);
    assert_eq!(error.held, 0);
    assert_eq!(error.model.get("x"), Some(&Value::Ref(1)));
}

#[test]
fn exhale_reports_exact_deficit() {
    let error = expect_failure(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           inhale acc(x.f)\n\
           exhale acc(x.f, 2)\n\
         }\n",
    );
    assert_eq!(error.demanded, 2);
    assert_eq!(error.held, 1);
}

#[test]
fn aliased_receivers_share_permission() {
    let verdict = verify(
        "field f: Int\n\
         method m(a: Ref, b: Ref) {\n\
           inhale a != null\n\
           inhale b != null\n\
           inhale acc(a.f)\n\
           assume a == b\n\
           exhale acc(b.f)\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn distinct_receivers_do_not_share() {
    let error = expect_failure(
        "field f: Int\n\
         method m(a: Ref, b: Ref) {\n\
           inhale a != null\n\
           inhale b != null\n\
           inhale acc(a.f)\n\
           assume a != b\n\
           exhale acc(b.f)\n\
         }\n",
    );
    assert_eq!(error.held, 0);
    // The failing model keeps the two references apart.
    assert_ne!(error.model.get("a"), error.model.get("b"));
}

#[test]
fn fold_then_unfold_round_trips_permission() {
    let verdict = verify(
        "field next: Ref\n\
         predicate list(this: Ref) { acc(this.next) }\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           inhale acc(x.next)\n\
           fold list(x)\n\
           unfold list(x)\n\
           x.next := null\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn unfold_without_instance_fails() {
    let error = expect_failure(
        "field next: Ref\n\
         predicate list(this: Ref) { acc(this.next) }\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           unfold list(x)\n\
         }\n",
    );
    assert_eq!(error.location.to_string(), "list(x)");
    assert_eq!(error.demanded, 1);
    assert_eq!(error.held, 0);
}

#[test]
fn assumed_heap_values_constrain_reads() {
    let verdict = verify(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           inhale acc(x.f)\n\
           inhale x.f == 1\n\
           assert x.f == 1\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);

    let error = expect_failure(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null\n\
           inhale acc(x.f)\n\
           inhale x.f == 1\n\
           assert x.f == 0\n\
         }\n",
    );
    assert_eq!(error.reason, FailureReason::AssertionViolation);
}

#[test]
fn conditional_permission_follows_its_guard() {
    let verdict = verify(
        "field f: Int\n\
         method m(x: Ref) {\n\
           inhale x != null ==> acc(x.f)\n\
           if (x != null) { x.f := 1 }\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn integer_models_cover_guard_polarity() {
    let verdict = verify(
        "method m(i: Int, n: Int) {\n\
           assume i < n\n\
           assert n > 0\n\
         }\n",
    );
    assert_eq!(verdict, Verdict::Pass);
}

#[test]
fn labels_and_info_are_reported() {
    let method = Method {
        name: "q".to_string(),
        params: vec![Param {
            name: "x".to_string(),
            ty: Type::Ref,
        }],
        returns: Vec::new(),
        requires: Vec::new(),
        ensures: Vec::new(),
        body: Some(Block::new(vec![
            Stmt::Inhale {
                expr: Expr::ne(Expr::var("x"), Expr::Null),
                info: None,
            },
            Stmt::Label("snap_0".to_string()),
            Stmt::Exhale {
                expr: Expr::acc(Expr::field(Expr::var("x"), "f")),
                info: Some(7),
            },
        ])),
    };
    let program = crate::ir::Program {
        fields: vec![crate::ir::FieldDecl {
            name: "f".to_string(),
            ty: Type::Int,
        }],
        predicates: Vec::new(),
        methods: vec![method],
    };
    let error = match SimOracle::new().verify(&program).unwrap() {
        Verdict::Fail(error) => error,
        Verdict::Pass => panic!("expected a failure"),
    };
    assert_eq!(error.labels, vec!["snap_0"]);
    assert_eq!(error.info, Some(7));
}
