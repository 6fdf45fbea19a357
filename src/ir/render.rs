//! Deterministic pretty-printer for the IR.
//!
//! Rendered text doubles as the canonical key form for atoms and resource
//! locations, so the output must be stable across runs.

use std::fmt;

use super::*;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Ref => write!(f, "Ref"),
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Null => write!(f, "null"),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Field { receiver, field } => write!(f, "{}.{}", receiver, field),
            Expr::Pred { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Acc { loc, amount } => {
                if *amount == 1 {
                    write!(f, "acc({})", loc)
                } else {
                    write!(f, "acc({}, {})", loc, amount)
                }
            }
            Expr::Unary { op, operand } => match op {
                UnOp::Not => write!(f, "!{}", paren(operand)),
                UnOp::Neg => write!(f, "-{}", paren(operand)),
            },
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", paren(lhs), op.as_str(), paren(rhs))
            }
        }
    }
}

/// Parenthesize compound subexpressions; leave atoms bare.
fn paren(e: &Expr) -> String {
    match e {
        Expr::Binary { .. } | Expr::Unary { .. } => format!("({})", e),
        _ => format!("{}", e),
    }
}

fn write_spec_clauses(
    f: &mut fmt::Formatter<'_>,
    keyword: &str,
    clauses: &[SpecClause],
    indent: usize,
) -> fmt::Result {
    for clause in clauses {
        write!(f, "{:indent$}{} ", "", keyword, indent = indent)?;
        match clause {
            SpecClause::Placeholder => writeln!(f, "?")?,
            SpecClause::Expr(e) => writeln!(f, "{}", e)?,
        }
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block, indent: usize) -> fmt::Result {
    writeln!(f, "{:indent$}{{", "", indent = indent)?;
    for stmt in &block.stmts {
        write_stmt(f, stmt, indent + 2)?;
    }
    writeln!(f, "{:indent$}}}", "", indent = indent)
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, indent: usize) -> fmt::Result {
    let pad = format!("{:indent$}", "", indent = indent);
    match stmt {
        Stmt::Var { name, ty, init } => match init {
            Some(e) => writeln!(f, "{}var {}: {} := {}", pad, name, ty, e),
            None => writeln!(f, "{}var {}: {}", pad, name, ty),
        },
        Stmt::Assign { target, value } => writeln!(f, "{}{} := {}", pad, target, value),
        Stmt::Write {
            receiver,
            field,
            value,
        } => writeln!(f, "{}{}.{} := {}", pad, receiver, field, value),
        Stmt::Call {
            targets,
            method,
            args,
        } => {
            write!(f, "{}", pad)?;
            if !targets.is_empty() {
                write!(f, "{} := ", targets.join(", "))?;
            }
            write!(f, "{}(", method)?;
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", a)?;
            }
            writeln!(f, ")")
        }
        Stmt::While {
            cond,
            invariants,
            body,
        } => {
            writeln!(f, "{}while ({})", pad, cond)?;
            write_spec_clauses(f, "invariant", invariants, indent + 2)?;
            write_block(f, body, indent)
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            writeln!(f, "{}if ({})", pad, cond)?;
            write_block(f, then_block, indent)?;
            if let Some(else_block) = else_block {
                writeln!(f, "{}else", pad)?;
                write_block(f, else_block, indent)?;
            }
            Ok(())
        }
        Stmt::Inhale { expr, .. } => writeln!(f, "{}inhale {}", pad, expr),
        Stmt::Exhale { expr, .. } => writeln!(f, "{}exhale {}", pad, expr),
        Stmt::Fold { access } => writeln!(f, "{}fold {}", pad, access),
        Stmt::Unfold { access } => writeln!(f, "{}unfold {}", pad, access),
        Stmt::Assert(e) => writeln!(f, "{}assert {}", pad, e),
        Stmt::Assume(e) => writeln!(f, "{}assume {}", pad, e),
        Stmt::Label(name) => writeln!(f, "{}label {}", pad, name),
        Stmt::Havoc(name) => writeln!(f, "{}havoc {}", pad, name),
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", p.name, p.ty)?;
    }
    Ok(())
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method {}(", self.name)?;
        write_params(f, &self.params)?;
        write!(f, ")")?;
        if !self.returns.is_empty() {
            write!(f, " returns (")?;
            write_params(f, &self.returns)?;
            write!(f, ")")?;
        }
        writeln!(f)?;
        write_spec_clauses(f, "requires", &self.requires, 2)?;
        write_spec_clauses(f, "ensures", &self.ensures, 2)?;
        if let Some(body) = &self.body {
            write_block(f, body, 0)?;
        }
        Ok(())
    }
}

impl fmt::Display for PredicateDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "predicate {}(", self.name)?;
        write_params(f, &self.params)?;
        write!(f, ")")?;
        match &self.body {
            Some(body) => {
                writeln!(f, " {{")?;
                writeln!(f, "  {}", body)?;
                writeln!(f, "}}")
            }
            None => writeln!(f),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.fields {
            writeln!(f, "field {}: {}", field.name, field.ty)?;
            first = false;
        }
        for pred in &self.predicates {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", pred)?;
            first = false;
        }
        for method in &self.methods {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", method)?;
            first = false;
        }
        Ok(())
    }
}
