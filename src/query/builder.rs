use crate::config::{BatchMode, ConsolidationMode};
use crate::infer::{Check, CheckBody, CheckStmt, Instance, LoopCheck, MethodCheck};
use crate::ir::{Block, Expr, Method, Param, Program, Stmt, Type};

use super::{folding, Query, QueryContext, QueryError, QueryKind, Snapshot};

/// Build the framing query: one method per placeholder, inhaling its body
/// conjunct by conjunct. A conjunct that reads a location earlier conjuncts
/// have not framed fails here before any check runs.
pub fn framing_query(ctx: &QueryContext<'_>) -> Result<Query, QueryError> {
    let mut builder = Builder::new(ctx);
    let mut methods = Vec::new();
    for placeholder in ctx.input.table.iter() {
        let instance = Instance::identity(placeholder.clone());
        let body = builder.body_of(&instance)?;
        if body.is_true() {
            continue;
        }
        let mut stmts = Vec::new();
        builder.inhale_site(&instance, &mut stmts)?;
        methods.push(Method {
            name: format!("frame_{}", placeholder.name),
            params: placeholder.params.clone(),
            returns: Vec::new(),
            requires: Vec::new(),
            ensures: Vec::new(),
            body: Some(Block::new(stmts)),
        });
    }
    Ok(builder.finish(QueryKind::Framing, methods))
}

/// Build the basic queries for all checks, batched per configuration.
pub fn basic_queries(ctx: &QueryContext<'_>) -> Result<Vec<Query>, QueryError> {
    match ctx.config.batch {
        BatchMode::Together => {
            let mut builder = Builder::new(ctx);
            let mut methods = Vec::new();
            for check in &ctx.input.checks {
                methods.push(builder.check_method(check)?);
            }
            Ok(vec![builder.finish(QueryKind::Basic, methods)])
        }
        BatchMode::PerCheck => {
            let mut queries = Vec::new();
            for check in &ctx.input.checks {
                let mut builder = Builder::new(ctx);
                let method = builder.check_method(check)?;
                queries.push(builder.finish(QueryKind::Basic, vec![method]));
            }
            Ok(queries)
        }
    }
}

struct Builder<'a> {
    ctx: &'a QueryContext<'a>,
    snapshots: Vec<Snapshot>,
}

impl<'a> Builder<'a> {
    fn new(ctx: &'a QueryContext<'a>) -> Self {
        Self {
            ctx,
            snapshots: Vec::new(),
        }
    }

    fn finish(self, kind: QueryKind, methods: Vec<Method>) -> Query {
        Query {
            kind,
            program: Program {
                fields: self.ctx.input.program.fields.clone(),
                predicates: self.ctx.input.program.predicates.clone(),
                methods,
            },
            snapshots: self.snapshots,
        }
    }

    /// The hypothesis body of a placeholder, instantiated at a use site.
    fn body_of(&self, instance: &Instance) -> Result<Expr, QueryError> {
        let body = self
            .ctx
            .hypothesis
            .body(instance.name())
            .ok_or_else(|| QueryError::MissingBody(instance.name().to_string()))?;
        Ok(instance.instantiate(body))
    }

    fn snapshot(&mut self, instance: Instance, exhaled: bool) -> (String, u32) {
        let info = self.snapshots.len() as u32;
        let label = format!("snap_{}", info);
        self.snapshots.push(Snapshot {
            label: label.clone(),
            instance,
            exhaled,
        });
        (label, info)
    }

    fn inhale_site(&mut self, instance: &Instance, out: &mut Vec<Stmt>) -> Result<(), QueryError> {
        let body = self.body_of(instance)?;
        let (label, info) = self.snapshot(instance.clone(), false);
        out.push(Stmt::Label(label));
        for conjunct in body.conjuncts() {
            if conjunct.is_true() {
                continue;
            }
            out.push(Stmt::Inhale {
                expr: (*conjunct).clone(),
                info: Some(info),
            });
        }
        match self.ctx.config.consolidation {
            ConsolidationMode::Off => {}
            ConsolidationMode::Assume => out.extend(disjointness(&body)),
            ConsolidationMode::Fold => {}
        }
        let program = &self.ctx.input.program;
        out.extend(folding::unfolds(&body, program, self.ctx.config.unfold_depth));
        if self.ctx.config.consolidation == ConsolidationMode::Fold {
            // Round-trip through the folded form so oracles with incomplete
            // heap joins see one canonical state.
            out.extend(folding::folds(&body, program, self.ctx.config.fold_depth));
            out.extend(folding::unfolds(&body, program, self.ctx.config.unfold_depth));
        }
        Ok(())
    }

    fn exhale_site(&mut self, instance: &Instance, out: &mut Vec<Stmt>) -> Result<(), QueryError> {
        let body = self.body_of(instance)?;
        let program = &self.ctx.input.program;
        out.extend(folding::folds(&body, program, self.ctx.config.fold_depth));
        let (label, info) = self.snapshot(instance.clone(), true);
        out.push(Stmt::Label(label));
        for conjunct in body.conjuncts() {
            if conjunct.is_true() {
                continue;
            }
            out.push(Stmt::Exhale {
                expr: (*conjunct).clone(),
                info: Some(info),
            });
        }
        Ok(())
    }

    fn check_method(&mut self, check: &Check) -> Result<Method, QueryError> {
        match check {
            Check::Method(check) => self.method_check(check),
            Check::Loop(check) => self.loop_check(check),
        }
    }

    fn method_check(&mut self, check: &MethodCheck) -> Result<Method, QueryError> {
        let mut params = check.params.clone();
        params.extend(check.returns.iter().cloned());
        let mut stmts = Vec::new();
        if self.ctx.config.branching {
            branch_splits(&params, &mut stmts);
        }
        self.inhale_site(&check.pre, &mut stmts)?;
        self.lower(&check.body, &mut stmts)?;
        self.exhale_site(&check.post, &mut stmts)?;
        Ok(Method {
            name: format!("check_{}", check.method),
            params,
            returns: Vec::new(),
            requires: Vec::new(),
            ensures: Vec::new(),
            body: Some(Block::new(stmts)),
        })
    }

    fn loop_check(&mut self, check: &LoopCheck) -> Result<Method, QueryError> {
        let mut stmts = Vec::new();
        if self.ctx.config.branching {
            branch_splits(&check.params, &mut stmts);
        }
        self.inhale_site(&check.invariant, &mut stmts)?;
        stmts.push(Stmt::Assume(check.guard.clone()));
        self.lower(&check.body, &mut stmts)?;
        self.exhale_site(&check.invariant, &mut stmts)?;
        Ok(Method {
            name: format!("check_{}", check.name),
            params: check.params.clone(),
            returns: Vec::new(),
            requires: Vec::new(),
            ensures: Vec::new(),
            body: Some(Block::new(stmts)),
        })
    }

    fn lower(&mut self, body: &CheckBody, out: &mut Vec<Stmt>) -> Result<(), QueryError> {
        for stmt in &body.stmts {
            match stmt {
                CheckStmt::Stmt(Stmt::Call {
                    targets,
                    method,
                    args,
                }) => self.lower_call(targets, method, args, out)?,
                CheckStmt::Stmt(other) => out.push(other.clone()),
                CheckStmt::Branch {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let mut then_stmts = Vec::new();
                    self.lower(then_body, &mut then_stmts)?;
                    let mut else_stmts = Vec::new();
                    self.lower(else_body, &mut else_stmts)?;
                    out.push(Stmt::If {
                        cond: cond.clone(),
                        then_block: Block::new(then_stmts),
                        else_block: if else_stmts.is_empty() {
                            None
                        } else {
                            Some(Block::new(else_stmts))
                        },
                    });
                }
                CheckStmt::Cut(cut) => {
                    // Loop boundary: exhale the invariant, forget everything
                    // the loop writes, resume under invariant and negated
                    // guard.
                    self.exhale_site(&cut.invariant, out)?;
                    for target in &cut.targets {
                        out.push(Stmt::Havoc(target.clone()));
                    }
                    self.inhale_site(&cut.invariant, out)?;
                    out.push(Stmt::Assume(Expr::not(cut.guard.clone())));
                }
            }
        }
        Ok(())
    }

    /// A call becomes its contract: give up the callee's precondition,
    /// forget the targets, take in the postcondition.
    fn lower_call(
        &mut self,
        targets: &[String],
        method: &str,
        args: &[Expr],
        out: &mut Vec<Stmt>,
    ) -> Result<(), QueryError> {
        let table = &self.ctx.input.table;
        let pre_name = format!("pre_{}", method);
        let post_name = format!("post_{}", method);
        let pre = table
            .get(&pre_name)
            .ok_or(QueryError::UnknownPlaceholder(pre_name))?
            .clone();
        let post = table
            .get(&post_name)
            .ok_or(QueryError::UnknownPlaceholder(post_name))?
            .clone();

        self.exhale_site(&Instance::new(pre, args.to_vec()), out)?;
        for target in targets {
            out.push(Stmt::Havoc(target.clone()));
        }
        let mut post_args = args.to_vec();
        post_args.extend(targets.iter().map(|t| Expr::var(t)));
        self.inhale_site(&Instance::new(post, post_args), out)?;
        Ok(())
    }
}

/// Empty if-splits on pairwise reference aliasing. A no-op for the built-in
/// oracle; symbolic-execution backends use the split to avoid merging heap
/// states across aliasing classes.
fn branch_splits(params: &[Param], out: &mut Vec<Stmt>) {
    let refs: Vec<&Param> = params.iter().filter(|p| p.ty == Type::Ref).collect();
    for (i, a) in refs.iter().enumerate() {
        for b in refs.iter().skip(i + 1) {
            out.push(Stmt::If {
                cond: Expr::binary(
                    crate::ir::BinOp::Eq,
                    Expr::var(&a.name),
                    Expr::var(&b.name),
                ),
                then_block: Block::default(),
                else_block: None,
            });
        }
    }
}

/// Pairwise disjointness facts implied by separating field conjuncts: two
/// unconditional full permissions to the same field force distinct
/// receivers.
fn disjointness(body: &Expr) -> Vec<Stmt> {
    let mut accesses: Vec<(&Expr, &str)> = Vec::new();
    for conjunct in body.conjuncts() {
        if let Expr::Acc { loc, .. } = conjunct {
            if let Expr::Field { receiver, field } = &**loc {
                accesses.push((receiver, field));
            }
        }
    }
    let mut out = Vec::new();
    for (i, (r1, f1)) in accesses.iter().enumerate() {
        for (r2, f2) in accesses.iter().skip(i + 1) {
            if f1 == f2 && r1 != r2 {
                out.push(Stmt::Assume(Expr::ne((*r1).clone(), (*r2).clone())));
            }
        }
    }
    out
}
