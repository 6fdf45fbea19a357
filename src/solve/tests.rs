use super::*;

fn solve(formula: &Formula) -> Option<Assignment> {
    SearchSolver::default().solve(formula)
}

#[test]
fn empty_formula_is_satisfiable() {
    let formula = Formula::default();
    assert_eq!(solve(&formula), Some(Assignment::new()));
}

#[test]
fn unit_clause_forces_value() {
    let mut formula = Formula::default();
    formula.push(Constraint::Bool(Term::var("a")));
    let model = solve(&formula).unwrap();
    assert_eq!(model.get("a"), Some(&true));
}

#[test]
fn contradiction_is_unsat() {
    let mut formula = Formula::default();
    formula.push(Constraint::Bool(Term::var("a")));
    formula.push(Constraint::Bool(Term::not(Term::var("a"))));
    assert!(solve(&formula).is_none());
}

#[test]
fn false_first_yields_minimal_model() {
    let mut formula = Formula::default();
    formula.push(Constraint::Bool(Term::or(vec![
        Term::var("a"),
        Term::var("b"),
    ])));
    let model = solve(&formula).unwrap();
    // `a` false, `b` true is the first model in branch order.
    assert_eq!(model.get("a"), Some(&false));
    assert_eq!(model.get("b"), Some(&true));
}

#[test]
fn sum_lower_bound() {
    let mut formula = Formula::default();
    formula.push(Constraint::SumGe {
        terms: vec![Term::var("a"), Term::var("b"), Term::var("c")],
        bound: 2,
    });
    let model = solve(&formula).unwrap();
    let count = ["a", "b", "c"]
        .iter()
        .filter(|v| model.get(**v) == Some(&true))
        .count();
    assert!(count >= 2);
}

#[test]
fn sum_upper_bound_conflicts_with_lower() {
    let mut formula = Formula::default();
    let terms = vec![Term::var("a"), Term::var("b")];
    formula.push(Constraint::SumGe {
        terms: terms.clone(),
        bound: 2,
    });
    formula.push(Constraint::SumLe { terms, bound: 1 });
    assert!(solve(&formula).is_none());
}

#[test]
fn conditional_constraint_only_binds_when_active() {
    let mut formula = Formula::default();
    formula.push(Constraint::When {
        cond: Term::var("g"),
        then: Box::new(Constraint::SumGe {
            terms: vec![Term::var("a")],
            bound: 1,
        }),
    });
    // Satisfiable with everything false (condition inactive).
    let model = solve(&formula).unwrap();
    assert_eq!(model.get("g"), Some(&false));

    // Forcing the condition requires the consequent.
    formula.push(Constraint::Bool(Term::var("g")));
    let model = solve(&formula).unwrap();
    assert_eq!(model.get("a"), Some(&true));
}

#[test]
fn infeasible_sum_bound_is_unsat() {
    let mut formula = Formula::default();
    formula.push(Constraint::SumGe {
        terms: vec![Term::var("a")],
        bound: 2,
    });
    assert!(solve(&formula).is_none());
}

#[test]
fn solver_is_deterministic() {
    let mut formula = Formula::default();
    formula.push(Constraint::SumGe {
        terms: vec![Term::var("x"), Term::var("y"), Term::var("z")],
        bound: 1,
    });
    let first = solve(&formula);
    let second = solve(&formula);
    assert_eq!(first, second);
}
