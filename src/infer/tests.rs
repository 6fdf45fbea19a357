use super::*;
use crate::syntax::parse;

fn preprocessed(source: &str) -> Input {
    preprocess(parse(source).unwrap()).unwrap()
}

#[test]
fn placeholders_created_per_method() {
    let input = preprocessed(
        "field f: Int\n\
         method set(x: Ref) requires ? ensures ? { x.f := 1 }\n",
    );
    assert_eq!(input.table.len(), 2);
    assert!(input.placeholder("pre_set").is_some());
    assert!(input.placeholder("post_set").is_some());
    assert_eq!(input.checks.len(), 1);
}

#[test]
fn atoms_and_resources_cover_ref_params() {
    let input = preprocessed(
        "field f: Int\n\
         method m(x: Ref, y: Ref, n: Int) requires ? { x.f := n }\n",
    );
    let pre = input.placeholder("pre_m").unwrap();
    let atoms: Vec<String> = pre.atoms.iter().map(|a| a.to_string()).collect();
    assert_eq!(atoms, vec!["x != null", "y != null", "x != y"]);
    let resources: Vec<String> = pre.resources.iter().map(|r| r.to_string()).collect();
    assert_eq!(resources, vec!["x.f", "y.f"]);
}

#[test]
fn predicate_resources_for_unary_ref_predicates() {
    let input = preprocessed(
        "field next: Ref\n\
         predicate list(this: Ref) { acc(this.next) }\n\
         method m(x: Ref) requires ? { unfold list(x) }\n",
    );
    let pre = input.placeholder("pre_m").unwrap();
    let resources: Vec<String> = pre.resources.iter().map(|r| r.to_string()).collect();
    assert_eq!(resources, vec!["x.next", "list(x)"]);
}

#[test]
fn instantiation_round_trips_through_inverse() {
    let input = preprocessed(
        "field f: Int\n\
         method m(a: Ref, b: Ref) requires ? { a.f := 0 }\n",
    );
    let pre = input.placeholder("pre_m").unwrap().clone();
    let instance = Instance::new(pre.clone(), vec![Expr::var("p"), Expr::var("q")]);
    for atom in &pre.atoms {
        let at_site = instance.instantiate(atom);
        let back = at_site.substitute(&instance.inverse_substitution());
        assert_eq!(&back, atom);
    }
}

#[test]
fn post_placeholder_sees_returns() {
    let input = preprocessed(
        "field f: Int\n\
         method get(x: Ref) returns (r: Ref) ensures ? { r := x }\n",
    );
    let post = input.placeholder("post_get").unwrap();
    let names: Vec<&str> = post.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["x", "r"]);
    // Both params are refs, so the aliasing atom appears.
    assert!(post.atoms.iter().any(|a| a.to_string() == "x != r"));
}

#[test]
fn loops_are_cut_out_of_method_bodies() {
    let input = preprocessed(
        "field f: Int\n\
         method m(x: Ref, n: Int) requires ?\n\
         {\n\
           var i: Int := 0\n\
           while (i < n) invariant ? { x.f := i  i := i + 1 }\n\
         }\n",
    );
    assert!(input.placeholder("inv_m_0").is_some());
    assert_eq!(input.checks.len(), 2);

    let method = input
        .checks
        .iter()
        .find_map(|c| match c {
            Check::Method(m) => Some(m),
            _ => None,
        })
        .unwrap();
    let cut = method
        .body
        .stmts
        .iter()
        .find_map(|s| match s {
            CheckStmt::Cut(cut) => Some(cut),
            _ => None,
        })
        .unwrap();
    assert_eq!(cut.targets, vec!["i"]);
    assert_eq!(cut.guard.to_string(), "i < n");

    let lp = input
        .checks
        .iter()
        .find_map(|c| match c {
            Check::Loop(l) => Some(l),
            _ => None,
        })
        .unwrap();
    // Loop scope: params plus the local declared before the loop.
    let names: Vec<&str> = lp.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["x", "n", "i"]);
}

#[test]
fn written_specs_stay_fixed() {
    let input = preprocessed(
        "field f: Int\n\
         method m(x: Ref) requires acc(x.f) { x.f := 0 }\n",
    );
    let pre = input.placeholder("pre_m").unwrap();
    assert!(pre.fixed);
    assert_eq!(pre.existing.len(), 1);
    let post = input.placeholder("post_m").unwrap();
    assert!(post.fixed);
    assert!(post.existing.is_empty());
}

#[test]
fn undeclared_callee_is_rejected() {
    let program = parse(
        "field f: Int\n\
         method m(x: Ref) requires ? { ghost(x) }\n",
    )
    .unwrap();
    let err = preprocess(program).unwrap_err();
    assert!(err[0].message.contains("undeclared method"));
}
