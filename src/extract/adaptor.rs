//! Adapting concrete failure locations into placeholder vocabularies.

use crate::infer::Instance;
use crate::ir::{BinOp, Expr, Program, UnOp};
use crate::oracle::{Model, Value};

/// A failure location resolved against the counterexample model. The field
/// receiver is kept as a value so a null-receiver failure still adapts: the
/// sample then forces a permission whose inhale rules the null model out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConcreteLoc {
    Field(Value, String),
    Pred(String, Vec<Value>),
}

/// Evaluate a heap-free expression under a model. `None` when the
/// expression reads the heap or mentions an unknown variable.
pub fn eval_pure(expr: &Expr, model: &Model) -> Option<Value> {
    match expr {
        Expr::Int(n) => Some(Value::Int(*n)),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Null => Some(Value::Null),
        Expr::Var(name) => model.get(name).copied(),
        Expr::Unary { op, operand } => match (op, eval_pure(operand, model)?) {
            (UnOp::Not, Value::Bool(b)) => Some(Value::Bool(!b)),
            (UnOp::Neg, Value::Int(n)) => Some(Value::Int(-n)),
            _ => None,
        },
        Expr::Binary { op, lhs, rhs } => {
            let left = eval_pure(lhs, model)?;
            let right = eval_pure(rhs, model)?;
            apply(*op, left, right)
        }
        Expr::Field { .. } | Expr::Pred { .. } | Expr::Acc { .. } => None,
    }
}

fn apply(op: BinOp, left: Value, right: Value) -> Option<Value> {
    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = match (left, right) {
                (Value::Null, Value::Null) => true,
                (Value::Null, Value::Ref(_)) | (Value::Ref(_), Value::Null) => false,
                (Value::Ref(a), Value::Ref(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                _ => return None,
            };
            Some(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
        }
        BinOp::And | BinOp::Or | BinOp::Implies => match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(match op {
                BinOp::And => a && b,
                BinOp::Or => a || b,
                _ => !a || b,
            })),
            _ => None,
        },
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Bool(match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                _ => a >= b,
            })),
            _ => None,
        },
        BinOp::Add | BinOp::Sub | BinOp::Mul => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(match op {
                BinOp::Add => a.wrapping_add(b),
                BinOp::Sub => a.wrapping_sub(b),
                _ => a.wrapping_mul(b),
            })),
            _ => None,
        },
    }
}

/// Resolve a source-level access location to a concrete cell.
pub fn concretize(loc: &Expr, model: &Model) -> Option<ConcreteLoc> {
    match loc {
        Expr::Field { receiver, field } => match eval_pure(receiver, model)? {
            value @ (Value::Ref(_) | Value::Null) => {
                Some(ConcreteLoc::Field(value, field.clone()))
            }
            _ => None,
        },
        Expr::Pred { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_pure(arg, model)?);
            }
            Some(ConcreteLoc::Pred(name.clone(), values))
        }
        _ => None,
    }
}

/// All resource expressions of the instance's placeholder that denote the
/// concrete location under the model. Aliased arguments yield several;
/// predicate resources count when their body covers the field within
/// `depth` unfoldings.
pub fn adapt(
    loc: &ConcreteLoc,
    instance: &Instance,
    model: &Model,
    program: &Program,
    depth: usize,
) -> Vec<Expr> {
    let placeholder = instance.placeholder();
    let substitution = instance.substitution();
    let mut out = Vec::new();
    for resource in &placeholder.resources {
        let at_site = resource.substitute(&substitution);
        let matches = match (resource, loc) {
            (Expr::Field { .. }, ConcreteLoc::Field(_, _)) => {
                concretize(&at_site, model).as_ref() == Some(loc)
            }
            (Expr::Pred { name, .. }, ConcreteLoc::Pred(target, _)) => {
                name == target && concretize(&at_site, model).as_ref() == Some(loc)
            }
            (Expr::Pred { name, .. }, ConcreteLoc::Field(receiver, field)) => {
                // A predicate resource covers a field cell when the body
                // reaches it and the receivers coincide.
                matches!(receiver, Value::Ref(_))
                    && match (&at_site, pred_covers_field(program, name, field, depth)) {
                        (Expr::Pred { args, .. }, true) => args
                            .first()
                            .and_then(|a| eval_pure(a, model))
                            .map(|v| v == *receiver)
                            .unwrap_or(false),
                        _ => false,
                    }
            }
            _ => false,
        };
        if matches && !out.contains(resource) {
            out.push(resource.clone());
        }
    }
    out
}

fn pred_covers_field(program: &Program, pred: &str, field: &str, depth: usize) -> bool {
    if depth == 0 {
        return false;
    }
    let Some(decl) = program.predicate(pred) else {
        return false;
    };
    let Some(body) = &decl.body else {
        return false;
    };
    body.conjuncts().iter().any(|conjunct| match conjunct {
        Expr::Acc { loc, .. } => match &**loc {
            Expr::Field { field: f, .. } => f == field,
            Expr::Pred { name, .. } => pred_covers_field(program, name, field, depth - 1),
            _ => false,
        },
        Expr::Binary {
            op: BinOp::Implies,
            rhs,
            ..
        } => match &**rhs {
            Expr::Acc { loc, .. } => matches!(&**loc, Expr::Field { field: f, .. } if f == field),
            _ => false,
        },
        _ => false,
    })
}
