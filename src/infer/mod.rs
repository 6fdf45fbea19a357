//! Specification placeholders, instances, and verification checks.
//!
//! Preprocessing turns a parsed program into an [`Input`]: a table of
//! placeholders (one per unknown pre/post/invariant site), and a list of
//! checks whose bodies have loop boundaries cut out for abstract treatment.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::ir::{Expr, Param, Program, Type};

mod input;
#[cfg(test)]
mod tests;

pub use input::{preprocess, Input};

// ─── Placeholders ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderKind {
    Precondition,
    Postcondition,
    Invariant,
}

/// A named unknown specification site, created once during preprocessing
/// and immutable afterwards.
#[derive(Clone, Debug)]
pub struct Placeholder {
    pub name: String,
    pub kind: PlaceholderKind,
    /// Typed formal arguments the specification may mention.
    pub params: Vec<Param>,
    /// Candidate atomic predicates: nullity and non-aliasing relations over
    /// the reference-typed parameters.
    pub atoms: Vec<Expr>,
    /// Candidate heap locations the specification may grant permission to.
    pub resources: Vec<Expr>,
    /// User-written conjuncts attached to the same site.
    pub existing: Vec<Expr>,
    /// A site with no `?` clause: kept verbatim, never widened by templates.
    pub fixed: bool,
}

impl Placeholder {
    /// Create a placeholder, deriving candidate atoms and resources from the
    /// reference-typed parameters and the program's field and predicate
    /// declarations.
    pub fn new(
        name: String,
        kind: PlaceholderKind,
        params: Vec<Param>,
        existing: Vec<Expr>,
        fixed: bool,
        program: &Program,
    ) -> Self {
        let refs: Vec<&Param> = params.iter().filter(|p| p.ty == Type::Ref).collect();

        let mut atoms = Vec::new();
        for r in &refs {
            atoms.push(Expr::ne(Expr::var(&r.name), Expr::Null));
        }
        for (i, a) in refs.iter().enumerate() {
            for b in refs.iter().skip(i + 1) {
                atoms.push(Expr::ne(Expr::var(&a.name), Expr::var(&b.name)));
            }
        }

        let mut resources = Vec::new();
        for r in &refs {
            for field in &program.fields {
                resources.push(Expr::field(Expr::var(&r.name), &field.name));
            }
        }
        for r in &refs {
            for pred in &program.predicates {
                if pred.params.len() == 1 && pred.params[0].ty == Type::Ref {
                    resources.push(Expr::Pred {
                        name: pred.name.clone(),
                        args: vec![Expr::var(&r.name)],
                    });
                }
            }
        }

        Self {
            name,
            kind,
            params,
            atoms,
            resources,
            existing,
            fixed,
        }
    }
}

/// The global placeholder table: exactly one entry per inference site.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderTable {
    map: BTreeMap<String, Arc<Placeholder>>,
}

impl PlaceholderTable {
    pub fn insert(&mut self, placeholder: Placeholder) -> Arc<Placeholder> {
        let arc = Arc::new(placeholder);
        let prev = self.map.insert(arc.name.clone(), arc.clone());
        debug_assert!(prev.is_none(), "duplicate placeholder {}", arc.name);
        arc
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Placeholder>> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Placeholder>> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ─── Instances ─────────────────────────────────────────────────────

/// A placeholder bound to concrete argument expressions at a use site.
#[derive(Clone, Debug)]
pub struct Instance {
    placeholder: Arc<Placeholder>,
    args: Vec<Expr>,
}

impl Instance {
    pub fn new(placeholder: Arc<Placeholder>, args: Vec<Expr>) -> Self {
        debug_assert_eq!(
            placeholder.params.len(),
            args.len(),
            "instance arity mismatch for {}",
            placeholder.name
        );
        Self { placeholder, args }
    }

    /// The identity instance: every parameter bound to itself.
    pub fn identity(placeholder: Arc<Placeholder>) -> Self {
        let args = placeholder
            .params
            .iter()
            .map(|p| Expr::var(&p.name))
            .collect();
        Self { placeholder, args }
    }

    pub fn placeholder(&self) -> &Arc<Placeholder> {
        &self.placeholder
    }

    pub fn name(&self) -> &str {
        &self.placeholder.name
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// Substitute the placeholder's parameters by this instance's arguments
    /// in a placeholder-relative expression.
    pub fn instantiate(&self, expr: &Expr) -> Expr {
        expr.substitute(&self.substitution())
    }

    /// The parameter → argument substitution map.
    pub fn substitution(&self) -> BTreeMap<String, Expr> {
        self.placeholder
            .params
            .iter()
            .zip(&self.args)
            .map(|(p, a)| (p.name.clone(), a.clone()))
            .collect()
    }

    /// The argument → parameter map for adapting locations back into the
    /// placeholder's vocabulary. Only simple variable arguments invert.
    pub fn inverse_substitution(&self) -> BTreeMap<String, Expr> {
        let mut map = BTreeMap::new();
        for (p, a) in self.placeholder.params.iter().zip(&self.args) {
            if let Expr::Var(name) = a {
                map.entry(name.clone()).or_insert(Expr::var(&p.name));
            }
        }
        map
    }
}

// ─── Checks ────────────────────────────────────────────────────────

/// A unit of verification work built once from the parsed program.
#[derive(Clone, Debug)]
pub enum Check {
    Method(MethodCheck),
    Loop(LoopCheck),
}

impl Check {
    pub fn name(&self) -> &str {
        match self {
            Check::Method(c) => &c.method,
            Check::Loop(c) => &c.name,
        }
    }
}

/// A method body checked against its pre/postcondition placeholders.
#[derive(Clone, Debug)]
pub struct MethodCheck {
    pub method: String,
    pub params: Vec<Param>,
    pub returns: Vec<Param>,
    pub pre: Instance,
    pub post: Instance,
    pub body: CheckBody,
}

/// A loop body checked against its invariant placeholder.
#[derive(Clone, Debug)]
pub struct LoopCheck {
    pub name: String,
    /// Variables in scope at the loop head.
    pub params: Vec<Param>,
    pub invariant: Instance,
    pub guard: Expr,
    pub body: CheckBody,
}

/// A loop boundary inside a check body, treated abstractly: exhale the
/// invariant, havoc the written variables, inhale invariant and negated
/// guard.
#[derive(Clone, Debug)]
pub struct Cut {
    pub invariant: Instance,
    pub guard: Expr,
    pub targets: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct CheckBody {
    pub stmts: Vec<CheckStmt>,
}

#[derive(Clone, Debug)]
pub enum CheckStmt {
    /// A straight-line statement copied verbatim into queries.
    Stmt(crate::ir::Stmt),
    Branch {
        cond: Expr,
        then_body: CheckBody,
        else_body: CheckBody,
    },
    Cut(Cut),
}

/// Collect the variables assigned anywhere in a check body.
pub fn assigned_vars(body: &CheckBody, out: &mut BTreeSet<String>) {
    use crate::ir::Stmt;
    for stmt in &body.stmts {
        match stmt {
            CheckStmt::Stmt(Stmt::Var { name, .. })
            | CheckStmt::Stmt(Stmt::Assign { target: name, .. })
            | CheckStmt::Stmt(Stmt::Havoc(name)) => {
                out.insert(name.clone());
            }
            CheckStmt::Stmt(Stmt::Call { targets, .. }) => {
                out.extend(targets.iter().cloned());
            }
            CheckStmt::Stmt(_) => {}
            CheckStmt::Branch {
                then_body,
                else_body,
                ..
            } => {
                assigned_vars(then_body, out);
                assigned_vars(else_body, out);
            }
            CheckStmt::Cut(cut) => {
                out.extend(cut.targets.iter().cloned());
            }
        }
    }
}
