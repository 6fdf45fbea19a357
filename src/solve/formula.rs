use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A complete assignment of boolean values to named variables.
pub type Assignment = BTreeMap<String, bool>;

/// A boolean term over named variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Lit(bool),
    Var(String),
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
}

impl Term {
    pub fn var(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    pub fn not(term: Term) -> Term {
        Term::Not(Box::new(term))
    }

    /// Conjunction with trivial simplification.
    pub fn and(terms: Vec<Term>) -> Term {
        let mut out = Vec::new();
        for t in terms {
            match t {
                Term::Lit(true) => {}
                Term::Lit(false) => return Term::Lit(false),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Lit(true),
            1 => out.pop().unwrap(),
            _ => Term::And(out),
        }
    }

    /// Disjunction with trivial simplification.
    pub fn or(terms: Vec<Term>) -> Term {
        let mut out = Vec::new();
        for t in terms {
            match t {
                Term::Lit(false) => {}
                Term::Lit(true) => return Term::Lit(true),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Lit(false),
            1 => out.pop().unwrap(),
            _ => Term::Or(out),
        }
    }

    /// Three-valued evaluation under a partial assignment.
    pub fn eval_partial(&self, assignment: &Assignment) -> Option<bool> {
        match self {
            Term::Lit(b) => Some(*b),
            Term::Var(name) => assignment.get(name).copied(),
            Term::Not(inner) => inner.eval_partial(assignment).map(|b| !b),
            Term::And(terms) => {
                let mut unknown = false;
                for t in terms {
                    match t.eval_partial(assignment) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Term::Or(terms) => {
                let mut unknown = false;
                for t in terms {
                    match t.eval_partial(assignment) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
        }
    }

    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::Lit(_) => {}
            Term::Var(name) => {
                out.insert(name.clone());
            }
            Term::Not(inner) => inner.collect_vars(out),
            Term::And(terms) | Term::Or(terms) => {
                for t in terms {
                    t.collect_vars(out);
                }
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Lit(b) => write!(f, "{}", b),
            Term::Var(name) => write!(f, "{}", name),
            Term::Not(inner) => write!(f, "!{}", inner),
            Term::And(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Term::Or(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One constraint of the satisfiability problem. Sum constraints count each
/// true term as one permission unit.
#[derive(Clone, Debug)]
pub enum Constraint {
    Bool(Term),
    SumGe { terms: Vec<Term>, bound: i64 },
    SumLe { terms: Vec<Term>, bound: i64 },
    /// `then` is only enforced when `cond` holds.
    When { cond: Term, then: Box<Constraint> },
}

impl Constraint {
    /// Three-valued satisfaction check under a partial assignment.
    pub fn eval_partial(&self, assignment: &Assignment) -> Option<bool> {
        match self {
            Constraint::Bool(term) => term.eval_partial(assignment),
            Constraint::SumGe { terms, bound } => {
                let (lo, hi) = sum_bounds(terms, assignment);
                if lo >= *bound {
                    Some(true)
                } else if hi < *bound {
                    Some(false)
                } else {
                    None
                }
            }
            Constraint::SumLe { terms, bound } => {
                let (lo, hi) = sum_bounds(terms, assignment);
                if hi <= *bound {
                    Some(true)
                } else if lo > *bound {
                    Some(false)
                } else {
                    None
                }
            }
            Constraint::When { cond, then } => match cond.eval_partial(assignment) {
                Some(false) => Some(true),
                Some(true) => then.eval_partial(assignment),
                None => match then.eval_partial(assignment) {
                    Some(true) => Some(true),
                    _ => None,
                },
            },
        }
    }

    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Constraint::Bool(term) => term.collect_vars(out),
            Constraint::SumGe { terms, .. } | Constraint::SumLe { terms, .. } => {
                for t in terms {
                    t.collect_vars(out);
                }
            }
            Constraint::When { cond, then } => {
                cond.collect_vars(out);
                then.collect_vars(out);
            }
        }
    }
}

/// Achievable [min, max] of a 0/1 sum under a partial assignment.
fn sum_bounds(terms: &[Term], assignment: &Assignment) -> (i64, i64) {
    let mut lo = 0;
    let mut hi = 0;
    for t in terms {
        match t.eval_partial(assignment) {
            Some(true) => {
                lo += 1;
                hi += 1;
            }
            Some(false) => {}
            None => hi += 1,
        }
    }
    (lo, hi)
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Bool(term) => write!(f, "{}", term),
            Constraint::SumGe { terms, bound } => write!(f, "sum({}) >= {}", join(terms), bound),
            Constraint::SumLe { terms, bound } => write!(f, "sum({}) <= {}", join(terms), bound),
            Constraint::When { cond, then } => write!(f, "{} -> [{}]", cond, then),
        }
    }
}

fn join(terms: &[Term]) -> String {
    terms
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A conjunction of constraints handed to the solver.
#[derive(Clone, Debug, Default)]
pub struct Formula {
    pub constraints: Vec<Constraint>,
}

impl Formula {
    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// All variables mentioned, in sorted order.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for c in &self.constraints {
            c.collect_vars(&mut out);
        }
        out
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.constraints {
            writeln!(f, "{}", c)?;
        }
        Ok(())
    }
}
