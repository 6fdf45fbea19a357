//! Fold/unfold instrumentation around specification sites.
//!
//! After inhaling a specification, held predicate instances are unfolded to
//! the configured depth so the body's field accesses verify; before exhaling
//! one, the same instances are folded back. The two depths must agree for
//! the instrumentation to be balanced.

use crate::ir::{BinOp, Expr, Program, Stmt};

/// Unfold statements for the predicate conjuncts of an inhaled body,
/// outermost first. Guarded conjuncts unfold under their guard.
pub fn unfolds(body: &Expr, program: &Program, depth: usize) -> Vec<Stmt> {
    let mut out = Vec::new();
    walk(body, program, depth, false, &mut out);
    out
}

/// Fold statements for the predicate conjuncts of a body about to be
/// exhaled, innermost first.
pub fn folds(body: &Expr, program: &Program, depth: usize) -> Vec<Stmt> {
    let mut out = Vec::new();
    walk(body, program, depth, true, &mut out);
    out
}

fn walk(expr: &Expr, program: &Program, depth: usize, fold: bool, out: &mut Vec<Stmt>) {
    if depth == 0 {
        return;
    }
    match expr {
        Expr::Binary {
            op: BinOp::And,
            lhs,
            rhs,
        } => {
            walk(lhs, program, depth, fold, out);
            walk(rhs, program, depth, fold, out);
        }
        Expr::Binary {
            op: BinOp::Implies,
            lhs,
            rhs,
        } => {
            let mut inner = Vec::new();
            walk(rhs, program, depth, fold, &mut inner);
            if !inner.is_empty() {
                out.push(Stmt::If {
                    cond: (**lhs).clone(),
                    then_block: crate::ir::Block::new(inner),
                    else_block: None,
                });
            }
        }
        Expr::Acc { loc, .. } => {
            if let Expr::Pred { name, args } = &**loc {
                let inner_body = program.predicate(name).and_then(|decl| {
                    decl.body.as_ref().map(|body| {
                        let map = decl
                            .params
                            .iter()
                            .zip(args)
                            .map(|(p, a)| (p.name.clone(), a.clone()))
                            .collect();
                        body.substitute(&map)
                    })
                });
                if fold {
                    // Fold bottom-up: inner instances first.
                    if let Some(inner_body) = &inner_body {
                        walk(inner_body, program, depth - 1, fold, out);
                    }
                    out.push(Stmt::Fold {
                        access: expr.clone(),
                    });
                } else {
                    out.push(Stmt::Unfold {
                        access: expr.clone(),
                    });
                    if let Some(inner_body) = &inner_body {
                        walk(inner_body, program, depth - 1, fold, out);
                    }
                }
            }
        }
        _ => {}
    }
}
