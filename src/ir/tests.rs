use std::collections::{BTreeMap, BTreeSet};

use super::*;

#[test]
fn render_expressions() {
    let acc = Expr::acc(Expr::field(Expr::var("x"), "f"));
    assert_eq!(acc.to_string(), "acc(x.f)");

    let acc2 = Expr::Acc {
        loc: Box::new(Expr::field(Expr::var("x"), "f")),
        amount: 2,
    };
    assert_eq!(acc2.to_string(), "acc(x.f, 2)");

    let guard = Expr::implies(
        Expr::ne(Expr::var("x"), Expr::Null),
        Expr::acc(Expr::field(Expr::var("x"), "f")),
    );
    assert_eq!(guard.to_string(), "(x != null) ==> acc(x.f)");
}

#[test]
fn substitution_is_capture_free() {
    let mut map = BTreeMap::new();
    map.insert("x".to_string(), Expr::var("a"));
    map.insert("y".to_string(), Expr::field(Expr::var("b"), "next"));

    let e = Expr::binary(
        BinOp::And,
        Expr::acc(Expr::field(Expr::var("x"), "f")),
        Expr::ne(Expr::var("y"), Expr::Null),
    );
    let sub = e.substitute(&map);
    assert_eq!(sub.to_string(), "acc(a.f) && (b.next != null)");
}

#[test]
fn conjuncts_flatten() {
    let e = Expr::and_all(vec![
        Expr::acc(Expr::field(Expr::var("x"), "f")),
        Expr::acc(Expr::field(Expr::var("y"), "f")),
        Expr::ne(Expr::var("x"), Expr::var("y")),
    ]);
    assert_eq!(e.conjuncts().len(), 3);
}

#[test]
fn and_all_collapses_trivial() {
    assert_eq!(Expr::and_all(vec![]), Expr::Bool(true));
    assert_eq!(
        Expr::and_all(vec![Expr::Bool(true), Expr::var("p")]),
        Expr::var("p")
    );
}

#[test]
fn free_vars_of_access() {
    let e = Expr::implies(
        Expr::ne(Expr::var("x"), Expr::var("y")),
        Expr::acc(Expr::field(Expr::var("y"), "f")),
    );
    let mut vars = BTreeSet::new();
    e.free_vars(&mut vars);
    assert_eq!(
        vars.into_iter().collect::<Vec<_>>(),
        vec!["x".to_string(), "y".to_string()]
    );
}
