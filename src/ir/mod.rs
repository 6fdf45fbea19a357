//! Intermediate representation for heap-manipulating programs.
//!
//! Programs are separation-logic flavored: methods carry pre/postcondition
//! clauses, loops carry invariant clauses, and specifications speak about
//! permissions (`acc(x.f)`, `acc(p(x))`) in integral units where full
//! permission is one unit. A spec clause written as `?` marks an inference
//! site to be filled in by the CEGIS loop.

use std::collections::BTreeMap;

mod render;
#[cfg(test)]
mod tests;

// ─── Declarations ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Ref,
    Int,
    Bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Abstract predicates have no body.
    pub body: Option<Expr>,
}

/// A single `requires`/`ensures`/`invariant` clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecClause {
    /// A `?` site whose conjuncts are inferred.
    Placeholder,
    /// An existing user-written conjunct.
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Vec<Param>,
    pub requires: Vec<SpecClause>,
    pub ensures: Vec<SpecClause>,
    /// Abstract methods have no body.
    pub body: Option<Block>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub fields: Vec<FieldDecl>,
    pub predicates: Vec<PredicateDecl>,
    pub methods: Vec<Method>,
}

impl Program {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateDecl> {
        self.predicates.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ─── Statements ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `var x: T` with optional initializer.
    Var {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// `x := e`
    Assign { target: String, value: Expr },
    /// `r.f := e`
    Write {
        receiver: Expr,
        field: String,
        value: Expr,
    },
    /// `a, b := m(args)` (targets may be empty)
    Call {
        targets: Vec<String>,
        method: String,
        args: Vec<Expr>,
    },
    While {
        cond: Expr,
        invariants: Vec<SpecClause>,
        body: Block,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// Add permissions and assume pure facts. The `info` tag is opaque to
    /// the oracle and echoed back on a failure at this statement.
    Inhale { expr: Expr, info: Option<u32> },
    /// Check pure facts and remove permissions.
    Exhale { expr: Expr, info: Option<u32> },
    /// Exchange a predicate body's permissions for the predicate instance.
    Fold { access: Expr },
    /// Exchange a predicate instance for its body's permissions.
    Unfold { access: Expr },
    Assert(Expr),
    Assume(Expr),
    Label(String),
    /// Assign an unconstrained value.
    Havoc(String),
}

// ─── Expressions ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    And,
    Or,
    Implies,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Implies => "==>",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Null,
    Var(String),
    /// Heap dereference `receiver.field`.
    Field { receiver: Box<Expr>, field: String },
    /// Predicate access `p(args)` (resource position only).
    Pred { name: String, args: Vec<Expr> },
    /// Permission assertion `acc(loc)` / `acc(loc, amount)`.
    Acc { loc: Box<Expr>, amount: i64 },
    Unary { op: UnOp, operand: Box<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    pub fn field(receiver: Expr, field: &str) -> Expr {
        Expr::Field {
            receiver: Box::new(receiver),
            field: field.to_string(),
        }
    }

    pub fn acc(loc: Expr) -> Expr {
        Expr::Acc {
            loc: Box::new(loc),
            amount: 1,
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Unary {
            op: UnOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Implies, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Ne, lhs, rhs)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Bool(true))
    }

    /// Conjoin a list of expressions; empty lists collapse to `true`.
    pub fn and_all(mut exprs: Vec<Expr>) -> Expr {
        exprs.retain(|e| !e.is_true());
        match exprs.len() {
            0 => Expr::Bool(true),
            1 => exprs.pop().unwrap(),
            _ => {
                let mut iter = exprs.into_iter();
                let first = iter.next().unwrap();
                iter.fold(first, |acc, e| Expr::binary(BinOp::And, acc, e))
            }
        }
    }

    /// Disjoin a list of expressions; empty lists collapse to `false`.
    pub fn or_all(mut exprs: Vec<Expr>) -> Expr {
        exprs.retain(|e| !matches!(e, Expr::Bool(false)));
        match exprs.len() {
            0 => Expr::Bool(false),
            1 => exprs.pop().unwrap(),
            _ => {
                let mut iter = exprs.into_iter();
                let first = iter.next().unwrap();
                iter.fold(first, |acc, e| Expr::binary(BinOp::Or, acc, e))
            }
        }
    }

    /// Flatten nested conjunctions into a list of conjuncts.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => {
                let mut out = lhs.conjuncts();
                out.extend(rhs.conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Capture-free substitution of variables by expressions.
    pub fn substitute(&self, map: &BTreeMap<String, Expr>) -> Expr {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::Null => self.clone(),
            Expr::Var(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Expr::Field { receiver, field } => Expr::Field {
                receiver: Box::new(receiver.substitute(map)),
                field: field.clone(),
            },
            Expr::Pred { name, args } => Expr::Pred {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            Expr::Acc { loc, amount } => Expr::Acc {
                loc: Box::new(loc.substitute(map)),
                amount: *amount,
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.substitute(map)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.substitute(map)),
                rhs: Box::new(rhs.substitute(map)),
            },
        }
    }

    /// Collect the free variable names of this expression.
    pub fn free_vars(&self, out: &mut std::collections::BTreeSet<String>) {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::Null => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Field { receiver, .. } => receiver.free_vars(out),
            Expr::Pred { args, .. } => {
                for a in args {
                    a.free_vars(out);
                }
            }
            Expr::Acc { loc, .. } => loc.free_vars(out),
            Expr::Unary { operand, .. } => operand.free_vars(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.free_vars(out);
                rhs.free_vars(out);
            }
        }
    }
}
