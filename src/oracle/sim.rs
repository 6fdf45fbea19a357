//! Built-in verification oracle: exhaustive execution over bounded models.
//!
//! Every method body is executed under every heap shape from a bounded
//! universe: each reference parameter is null, aliased with an earlier one,
//! or fresh; integers range over a small window. Permissions are accounted
//! exactly, in integral units. The first failing execution is reported with
//! its concrete model.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::ir::{BinOp, Expr, Method, Param, Program, Stmt, Type, UnOp};

use super::{
    FailureReason, Oracle, OracleError, Value, Verdict, VerificationError,
};

/// A concrete heap location.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Loc {
    Field(u32, String),
    Pred(String, Vec<Value>),
}

enum Stop {
    /// An assumption failed; the path is vacuous.
    Infeasible,
    Fail(VerificationError),
    /// A heap location was read before any value was stored; the executor
    /// forks over the candidate values of the given type.
    NeedHeap(Loc, Type),
    Internal(OracleError),
}

type Exec<T> = Result<T, Stop>;

#[derive(Clone, Debug, Default)]
struct State {
    store: BTreeMap<String, Value>,
    types: BTreeMap<String, Type>,
    perms: BTreeMap<Loc, i64>,
    heap: BTreeMap<Loc, Value>,
    labels: Vec<String>,
    next_ref: u32,
}

struct Ctx<'a> {
    program: &'a Program,
    method: &'a str,
}

enum Outcome<'a> {
    Continue,
    Push(&'a [Stmt]),
    ForkVar(String, Type),
}

/// The bounded-enumeration oracle.
pub struct SimOracle {
    /// Window of concrete integer values used for parameters, havocs, and
    /// uninitialized heap cells.
    int_values: Vec<i64>,
}

impl Default for SimOracle {
    fn default() -> Self {
        Self {
            int_values: vec![0, 1],
        }
    }
}

impl SimOracle {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Model Enumeration ─────────────────────────────────────────

    fn candidates(&self, ty: Type, state: &State) -> Vec<Value> {
        match ty {
            Type::Bool => vec![Value::Bool(false), Value::Bool(true)],
            Type::Int => self.int_values.iter().map(|n| Value::Int(*n)).collect(),
            Type::Ref => {
                let mut out = vec![Value::Null];
                for id in used_refs(state) {
                    out.push(Value::Ref(id));
                }
                out.push(Value::Ref(state.next_ref.max(1)));
                out
            }
        }
    }

    fn check_method(
        &self,
        program: &Program,
        method: &Method,
    ) -> Result<Option<VerificationError>, OracleError> {
        let mut vars: Vec<Param> = method.params.clone();
        vars.extend(method.returns.iter().cloned());
        let ctx = Ctx {
            program,
            method: &method.name,
        };
        let mut state = State {
            next_ref: 1,
            ..State::default()
        };
        self.enumerate(&ctx, method, &vars, 0, &mut state)
    }

    fn enumerate(
        &self,
        ctx: &Ctx<'_>,
        method: &Method,
        vars: &[Param],
        index: usize,
        state: &mut State,
    ) -> Result<Option<VerificationError>, OracleError> {
        if index == vars.len() {
            let body = match &method.body {
                Some(body) => body,
                None => return Ok(None),
            };
            trace!(method = ctx.method, model = ?state.store, "running model");
            return match self.step(ctx, state.clone(), vec![(body.stmts.as_slice(), 0)]) {
                Ok(()) | Err(Stop::Infeasible) => Ok(None),
                Err(Stop::Fail(error)) => Ok(Some(error)),
                Err(Stop::Internal(error)) => Err(error),
                Err(Stop::NeedHeap(_, _)) => Err(OracleError::Unsupported(
                    "unresolved heap read".to_string(),
                )),
            };
        }
        let var = &vars[index];
        state.types.insert(var.name.clone(), var.ty);
        for value in self.candidates(var.ty, state) {
            let mut next = state.clone();
            if let Value::Ref(id) = value {
                next.next_ref = next.next_ref.max(id + 1);
            }
            next.store.insert(var.name.clone(), value);
            if let Some(error) = self.enumerate(ctx, method, vars, index + 1, &mut next)? {
                return Ok(Some(error));
            }
        }
        Ok(None)
    }

    // ─── Execution ─────────────────────────────────────────────────

    fn step<'a>(
        &self,
        ctx: &Ctx<'a>,
        mut state: State,
        mut frames: Vec<(&'a [Stmt], usize)>,
    ) -> Exec<()> {
        loop {
            let (stmts, index) = match frames.last().copied() {
                None => return Ok(()),
                Some(top) => top,
            };
            if index >= stmts.len() {
                frames.pop();
                continue;
            }
            let resume = frames.clone();
            if let Some(top) = frames.last_mut() {
                top.1 += 1;
            }
            let pre = state.clone();
            match self.exec_stmt(ctx, &mut state, &stmts[index]) {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Push(block)) => frames.push((block, 0)),
                Ok(Outcome::ForkVar(name, ty)) => {
                    for value in self.candidates(ty, &state) {
                        let mut next = state.clone();
                        if let Value::Ref(id) = value {
                            next.next_ref = next.next_ref.max(id + 1);
                        }
                        next.store.insert(name.clone(), value);
                        match self.step(ctx, next, frames.clone()) {
                            Ok(()) | Err(Stop::Infeasible) => {}
                            Err(stop) => return Err(stop),
                        }
                    }
                    return Ok(());
                }
                Err(Stop::NeedHeap(loc, ty)) => {
                    // Re-run the same statement once the cell has a value.
                    for value in self.candidates(ty, &pre) {
                        let mut next = pre.clone();
                        if let Value::Ref(id) = value {
                            next.next_ref = next.next_ref.max(id + 1);
                        }
                        next.heap.insert(loc.clone(), value);
                        match self.step(ctx, next, resume.clone()) {
                            Ok(()) | Err(Stop::Infeasible) => {}
                            Err(stop) => return Err(stop),
                        }
                    }
                    return Ok(());
                }
                Err(stop) => return Err(stop),
            }
        }
    }

    fn exec_stmt<'a>(
        &self,
        ctx: &Ctx<'a>,
        state: &mut State,
        stmt: &'a Stmt,
    ) -> Exec<Outcome<'a>> {
        match stmt {
            Stmt::Var { name, ty, init } => {
                state.types.insert(name.clone(), *ty);
                match init {
                    Some(expr) => {
                        let value = self.eval(ctx, state, expr, None)?;
                        state.store.insert(name.clone(), value);
                        Ok(Outcome::Continue)
                    }
                    None => Ok(Outcome::ForkVar(name.clone(), *ty)),
                }
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(ctx, state, value, None)?;
                state.store.insert(target.clone(), value);
                Ok(Outcome::Continue)
            }
            Stmt::Write {
                receiver,
                field,
                value,
            } => {
                let value = self.eval(ctx, state, value, None)?;
                let location = Expr::field(receiver.clone(), field);
                let id = match self.eval(ctx, state, receiver, None)? {
                    Value::Ref(id) => id,
                    Value::Null => {
                        return Err(self.fail(ctx, state, location, 1, 0, None));
                    }
                    _ => return Err(ill_typed(receiver)),
                };
                let loc = Loc::Field(id, field.clone());
                let held = state.perms.get(&loc).copied().unwrap_or(0);
                if held < 1 {
                    return Err(self.fail(ctx, state, location, 1, held, None));
                }
                state.heap.insert(loc, value);
                Ok(Outcome::Continue)
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => match self.eval(ctx, state, cond, None)? {
                Value::Bool(true) => Ok(Outcome::Push(&then_block.stmts)),
                Value::Bool(false) => match else_block {
                    Some(block) => Ok(Outcome::Push(&block.stmts)),
                    None => Ok(Outcome::Continue),
                },
                _ => Err(ill_typed(cond)),
            },
            Stmt::Inhale { expr, info } => {
                self.inhale(ctx, state, expr, *info)?;
                Ok(Outcome::Continue)
            }
            Stmt::Exhale { expr, info } => {
                self.exhale(ctx, state, expr, *info)?;
                Ok(Outcome::Continue)
            }
            Stmt::Fold { access } => {
                self.fold(ctx, state, access, false)?;
                Ok(Outcome::Continue)
            }
            Stmt::Unfold { access } => {
                self.fold(ctx, state, access, true)?;
                Ok(Outcome::Continue)
            }
            Stmt::Assert(expr) => match self.eval(ctx, state, expr, None)? {
                Value::Bool(true) => Ok(Outcome::Continue),
                Value::Bool(false) => Err(self.fail_assert(ctx, state, expr, None)),
                _ => Err(ill_typed(expr)),
            },
            Stmt::Assume(expr) => match self.eval(ctx, state, expr, None)? {
                Value::Bool(true) => Ok(Outcome::Continue),
                Value::Bool(false) => Err(Stop::Infeasible),
                _ => Err(ill_typed(expr)),
            },
            Stmt::Label(name) => {
                state.labels.push(name.clone());
                Ok(Outcome::Continue)
            }
            Stmt::Havoc(name) => {
                let ty = match state.types.get(name) {
                    Some(ty) => *ty,
                    None => return Err(Stop::Internal(OracleError::Unknown(name.clone()))),
                };
                Ok(Outcome::ForkVar(name.clone(), ty))
            }
            Stmt::While { .. } => Err(Stop::Internal(OracleError::Unsupported(
                "loop in query".to_string(),
            ))),
            Stmt::Call { method, .. } => Err(Stop::Internal(OracleError::Unsupported(format!(
                "call to `{}` in query",
                method
            )))),
        }
    }

    // ─── Inhale / Exhale ───────────────────────────────────────────

    fn inhale(&self, ctx: &Ctx<'_>, state: &mut State, expr: &Expr, info: Option<u32>) -> Exec<()> {
        match expr {
            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => {
                self.inhale(ctx, state, lhs, info)?;
                self.inhale(ctx, state, rhs, info)
            }
            Expr::Binary {
                op: BinOp::Implies,
                lhs,
                rhs,
            } => match self.eval(ctx, state, lhs, info)? {
                Value::Bool(true) => self.inhale(ctx, state, rhs, info),
                Value::Bool(false) => Ok(()),
                _ => Err(ill_typed(lhs)),
            },
            Expr::Acc { loc, amount } => {
                let loc = match self.resolve_loc(ctx, state, loc, info)? {
                    // Permission to a null location is contradictory.
                    None => return Err(Stop::Infeasible),
                    Some(loc) => loc,
                };
                let entry = state.perms.entry(loc).or_insert(0);
                *entry += amount;
                // Holding more than full permission is contradictory too;
                // inhaling it makes the state unreachable.
                if *entry > 1 {
                    return Err(Stop::Infeasible);
                }
                Ok(())
            }
            pure => match self.eval(ctx, state, pure, info)? {
                Value::Bool(true) => Ok(()),
                Value::Bool(false) => Err(Stop::Infeasible),
                _ => Err(ill_typed(pure)),
            },
        }
    }

    fn exhale(&self, ctx: &Ctx<'_>, state: &mut State, expr: &Expr, info: Option<u32>) -> Exec<()> {
        match expr {
            Expr::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => {
                self.exhale(ctx, state, lhs, info)?;
                self.exhale(ctx, state, rhs, info)
            }
            Expr::Binary {
                op: BinOp::Implies,
                lhs,
                rhs,
            } => match self.eval(ctx, state, lhs, info)? {
                Value::Bool(true) => self.exhale(ctx, state, rhs, info),
                Value::Bool(false) => Ok(()),
                _ => Err(ill_typed(lhs)),
            },
            Expr::Acc { loc, amount } => {
                let resolved = match self.resolve_loc(ctx, state, loc, info)? {
                    None => return Err(self.fail(ctx, state, (**loc).clone(), *amount, 0, info)),
                    Some(resolved) => resolved,
                };
                let held = state.perms.get(&resolved).copied().unwrap_or(0);
                if held < *amount {
                    return Err(self.fail(ctx, state, (**loc).clone(), *amount, held, info));
                }
                state.perms.insert(resolved, held - amount);
                Ok(())
            }
            pure => match self.eval(ctx, state, pure, info)? {
                Value::Bool(true) => Ok(()),
                Value::Bool(false) => Err(self.fail_assert(ctx, state, pure, info)),
                _ => Err(ill_typed(pure)),
            },
        }
    }

    /// Fold exchanges the body for the instance (`unfold` the reverse).
    fn fold(&self, ctx: &Ctx<'_>, state: &mut State, access: &Expr, unfold: bool) -> Exec<()> {
        let (loc, amount) = match access {
            Expr::Acc { loc, amount } => (&**loc, *amount),
            _ => return Err(ill_typed(access)),
        };
        let (name, args) = match loc {
            Expr::Pred { name, args } => (name, args),
            _ => return Err(ill_typed(loc)),
        };
        let decl = match ctx.program.predicate(name) {
            Some(decl) => decl,
            None => return Err(Stop::Internal(OracleError::Unknown(name.clone()))),
        };
        let body = decl.body.as_ref().map(|body| {
            let map = decl
                .params
                .iter()
                .zip(args)
                .map(|(p, a)| (p.name.clone(), a.clone()))
                .collect();
            body.substitute(&map)
        });
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(ctx, state, arg, None)?);
        }
        let instance = Loc::Pred(name.clone(), values);

        if unfold {
            let held = state.perms.get(&instance).copied().unwrap_or(0);
            if held < amount {
                return Err(self.fail(ctx, state, loc.clone(), amount, held, None));
            }
            state.perms.insert(instance, held - amount);
            if let Some(body) = &body {
                self.inhale(ctx, state, body, None)?;
            }
        } else {
            if let Some(body) = &body {
                self.exhale(ctx, state, body, None)?;
            }
            let entry = state.perms.entry(instance).or_insert(0);
            *entry += amount;
            if *entry > 1 {
                return Err(Stop::Infeasible);
            }
        }
        Ok(())
    }

    /// Resolve an access location to a concrete cell. `None` means the
    /// receiver is null.
    fn resolve_loc(
        &self,
        ctx: &Ctx<'_>,
        state: &mut State,
        loc: &Expr,
        info: Option<u32>,
    ) -> Exec<Option<Loc>> {
        match loc {
            Expr::Field { receiver, field } => match self.eval(ctx, state, receiver, info)? {
                Value::Ref(id) => Ok(Some(Loc::Field(id, field.clone()))),
                Value::Null => Ok(None),
                _ => Err(ill_typed(receiver)),
            },
            Expr::Pred { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(ctx, state, arg, info)?);
                }
                Ok(Some(Loc::Pred(name.clone(), values)))
            }
            _ => Err(ill_typed(loc)),
        }
    }

    // ─── Pure Evaluation ───────────────────────────────────────────

    fn eval(&self, ctx: &Ctx<'_>, state: &State, expr: &Expr, info: Option<u32>) -> Exec<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Var(name) => match state.store.get(name) {
                Some(value) => Ok(*value),
                None => Err(Stop::Internal(OracleError::Unknown(name.clone()))),
            },
            Expr::Field { receiver, field } => {
                let id = match self.eval(ctx, state, receiver, info)? {
                    Value::Ref(id) => id,
                    Value::Null => {
                        return Err(self.fail(ctx, state, expr.clone(), 1, 0, info));
                    }
                    _ => return Err(ill_typed(receiver)),
                };
                let loc = Loc::Field(id, field.clone());
                let held = state.perms.get(&loc).copied().unwrap_or(0);
                if held < 1 {
                    return Err(self.fail(ctx, state, expr.clone(), 1, held, info));
                }
                match state.heap.get(&loc) {
                    Some(value) => Ok(*value),
                    None => {
                        let ty = match ctx.program.field(field) {
                            Some(decl) => decl.ty,
                            None => {
                                return Err(Stop::Internal(OracleError::Unknown(field.clone())))
                            }
                        };
                        Err(Stop::NeedHeap(loc, ty))
                    }
                }
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(ctx, state, operand, info)?;
                match (op, value) {
                    (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
                    _ => Err(ill_typed(expr)),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(ctx, state, *op, lhs, rhs, info),
            Expr::Pred { .. } | Expr::Acc { .. } => Err(ill_typed(expr)),
        }
    }

    fn eval_binary(
        &self,
        ctx: &Ctx<'_>,
        state: &State,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        info: Option<u32>,
    ) -> Exec<Value> {
        // Short-circuiting boolean connectives.
        if matches!(op, BinOp::And | BinOp::Or | BinOp::Implies) {
            let left = match self.eval(ctx, state, lhs, info)? {
                Value::Bool(b) => b,
                _ => return Err(ill_typed(lhs)),
            };
            match (op, left) {
                (BinOp::And, false) => return Ok(Value::Bool(false)),
                (BinOp::Or, true) => return Ok(Value::Bool(true)),
                (BinOp::Implies, false) => return Ok(Value::Bool(true)),
                _ => {}
            }
            return match self.eval(ctx, state, rhs, info)? {
                Value::Bool(b) => Ok(Value::Bool(b)),
                _ => Err(ill_typed(rhs)),
            };
        }

        let left = self.eval(ctx, state, lhs, info)?;
        let right = self.eval(ctx, state, rhs, info)?;
        match op {
            BinOp::Eq | BinOp::Ne => {
                let equal = match (left, right) {
                    (Value::Null, Value::Null) => true,
                    (Value::Null, Value::Ref(_)) | (Value::Ref(_), Value::Null) => false,
                    (Value::Ref(a), Value::Ref(b)) => a == b,
                    (Value::Int(a), Value::Int(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    _ => return Err(ill_typed(lhs)),
                };
                Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let (a, b) = match (left, right) {
                    (Value::Int(a), Value::Int(b)) => (a, b),
                    _ => return Err(ill_typed(lhs)),
                };
                Ok(Value::Bool(match op {
                    BinOp::Lt => a < b,
                    BinOp::Le => a <= b,
                    BinOp::Gt => a > b,
                    _ => a >= b,
                }))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let (a, b) = match (left, right) {
                    (Value::Int(a), Value::Int(b)) => (a, b),
                    _ => return Err(ill_typed(lhs)),
                };
                Ok(Value::Int(match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                }))
            }
            // Booleans were handled above.
            BinOp::And | BinOp::Or | BinOp::Implies => Err(ill_typed(lhs)),
        }
    }

    // ─── Failure Construction ──────────────────────────────────────

    fn fail(
        &self,
        ctx: &Ctx<'_>,
        state: &State,
        location: Expr,
        demanded: i64,
        held: i64,
        info: Option<u32>,
    ) -> Stop {
        Stop::Fail(VerificationError {
            method: ctx.method.to_string(),
            reason: FailureReason::InsufficientPermission,
            location,
            demanded,
            held,
            labels: state.labels.clone(),
            info,
            model: state.store.clone(),
        })
    }

    fn fail_assert(&self, ctx: &Ctx<'_>, state: &State, expr: &Expr, info: Option<u32>) -> Stop {
        Stop::Fail(VerificationError {
            method: ctx.method.to_string(),
            reason: FailureReason::AssertionViolation,
            location: expr.clone(),
            demanded: 0,
            held: 0,
            labels: state.labels.clone(),
            info,
            model: state.store.clone(),
        })
    }
}

fn ill_typed(expr: &Expr) -> Stop {
    Stop::Internal(OracleError::IllTyped(expr.to_string()))
}

fn used_refs(state: &State) -> BTreeSet<u32> {
    let mut out = BTreeSet::new();
    let mut note = |value: &Value| {
        if let Value::Ref(id) = value {
            out.insert(*id);
        }
    };
    for value in state.store.values() {
        note(value);
    }
    for value in state.heap.values() {
        note(value);
    }
    for loc in state.perms.keys() {
        match loc {
            Loc::Field(id, _) => {
                out.insert(*id);
            }
            Loc::Pred(_, args) => {
                for value in args {
                    if let Value::Ref(id) = value {
                        out.insert(*id);
                    }
                }
            }
        }
    }
    out
}

impl Oracle for SimOracle {
    fn verify(&mut self, program: &Program) -> Result<Verdict, OracleError> {
        for method in &program.methods {
            if method.body.is_none() {
                continue;
            }
            if let Some(error) = self.check_method(program, method)? {
                return Ok(Verdict::Fail(error));
            }
        }
        Ok(Verdict::Pass)
    }
}
