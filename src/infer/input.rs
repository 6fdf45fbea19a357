//! Program preprocessing: placeholder creation and check extraction.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::ir::{Block, Expr, Method, Param, Program, SpecClause, Stmt};
use crate::syntax::span::Span;

use super::{
    assigned_vars, Check, CheckBody, CheckStmt, Cut, Instance, LoopCheck, MethodCheck,
    Placeholder, PlaceholderKind, PlaceholderTable,
};

/// The preprocessed inference problem: the original program, the placeholder
/// table, and the checks every candidate specification is verified against.
#[derive(Clone, Debug)]
pub struct Input {
    pub program: Program,
    pub table: PlaceholderTable,
    pub checks: Vec<Check>,
}

impl Input {
    pub fn placeholder(&self, name: &str) -> Option<&Arc<Placeholder>> {
        self.table.get(name)
    }
}

/// Turn a parsed program into an [`Input`]. Every method gets pre/post
/// placeholders (named `pre_<m>` / `post_<m>`), every loop an invariant
/// placeholder (`inv_<m>_<i>`); loops inside method bodies are cut out into
/// their own checks and replaced by [`Cut`] boundaries.
pub fn preprocess(program: Program) -> Result<Input, Vec<Diagnostic>> {
    let diagnostics = validate(&program);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let mut table = PlaceholderTable::default();
    let mut checks = Vec::new();

    for method in &program.methods {
        let (existing_pre, open_pre) = split_clauses(&method.requires);
        let (existing_post, open_post) = split_clauses(&method.ensures);

        let pre = table.insert(Placeholder::new(
            format!("pre_{}", method.name),
            PlaceholderKind::Precondition,
            method.params.clone(),
            existing_pre,
            !open_pre,
            &program,
        ));

        let mut post_params = method.params.clone();
        post_params.extend(method.returns.iter().cloned());
        let post = table.insert(Placeholder::new(
            format!("post_{}", method.name),
            PlaceholderKind::Postcondition,
            post_params,
            existing_post,
            !open_post,
            &program,
        ));

        if let Some(body) = &method.body {
            let mut lowering = Lowering {
                program: &program,
                table: &mut table,
                checks: &mut checks,
                method,
                loop_counter: 0,
            };
            let mut scope = method.params.clone();
            scope.extend(method.returns.iter().cloned());
            let body = lowering.lower_block(body, &mut scope);
            checks.push(Check::Method(MethodCheck {
                method: method.name.clone(),
                params: method.params.clone(),
                returns: method.returns.clone(),
                pre: Instance::identity(pre),
                post: Instance::identity(post),
                body,
            }));
        }
    }

    Ok(Input {
        program,
        table,
        checks,
    })
}

/// Partition spec clauses into existing conjuncts and a flag for whether a
/// `?` site was present.
fn split_clauses(clauses: &[SpecClause]) -> (Vec<Expr>, bool) {
    let mut existing = Vec::new();
    let mut open = false;
    for clause in clauses {
        match clause {
            SpecClause::Placeholder => open = true,
            SpecClause::Expr(expr) => existing.push(expr.clone()),
        }
    }
    (existing, open)
}

struct Lowering<'a> {
    program: &'a Program,
    table: &'a mut PlaceholderTable,
    checks: &'a mut Vec<Check>,
    method: &'a Method,
    loop_counter: usize,
}

impl Lowering<'_> {
    fn lower_block(&mut self, block: &Block, scope: &mut Vec<Param>) -> CheckBody {
        let mut out = CheckBody::default();
        for stmt in &block.stmts {
            match stmt {
                Stmt::While {
                    cond,
                    invariants,
                    body,
                } => {
                    out.stmts.push(self.lower_loop(cond, invariants, body, scope));
                }
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    // Branch scopes are independent copies: declarations made
                    // inside a branch are not visible after it.
                    let mut then_scope = scope.clone();
                    let then_body = self.lower_block(then_block, &mut then_scope);
                    let else_body = match else_block {
                        Some(block) => {
                            let mut else_scope = scope.clone();
                            self.lower_block(block, &mut else_scope)
                        }
                        None => CheckBody::default(),
                    };
                    out.stmts.push(CheckStmt::Branch {
                        cond: cond.clone(),
                        then_body,
                        else_body,
                    });
                }
                Stmt::Var { name, ty, .. } => {
                    scope.push(Param {
                        name: name.clone(),
                        ty: *ty,
                    });
                    out.stmts.push(CheckStmt::Stmt(stmt.clone()));
                }
                other => out.stmts.push(CheckStmt::Stmt(other.clone())),
            }
        }
        out
    }

    fn lower_loop(
        &mut self,
        cond: &Expr,
        invariants: &[SpecClause],
        body: &Block,
        scope: &[Param],
    ) -> CheckStmt {
        let index = self.loop_counter;
        self.loop_counter += 1;

        let (existing, open) = split_clauses(invariants);
        let placeholder = self.table.insert(Placeholder::new(
            format!("inv_{}_{}", self.method.name, index),
            PlaceholderKind::Invariant,
            scope.to_vec(),
            existing,
            !open,
            self.program,
        ));

        let mut loop_scope = scope.to_vec();
        let lowered = self.lower_block(body, &mut loop_scope);

        // Only variables visible outside the loop are havocked at the cut.
        let mut assigned = BTreeSet::new();
        assigned_vars(&lowered, &mut assigned);
        let targets: Vec<String> = scope
            .iter()
            .filter(|p| assigned.contains(&p.name))
            .map(|p| p.name.clone())
            .collect();

        self.checks.push(Check::Loop(LoopCheck {
            name: placeholder.name.clone(),
            params: scope.to_vec(),
            invariant: Instance::identity(placeholder.clone()),
            guard: cond.clone(),
            body: lowered,
        }));

        CheckStmt::Cut(Cut {
            invariant: Instance::identity(placeholder),
            guard: cond.clone(),
            targets,
        })
    }
}

/// Light well-formedness pass: call targets must name declared methods with
/// matching arities; field writes must name declared fields.
fn validate(program: &Program) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for method in &program.methods {
        let Some(body) = &method.body else { continue };
        validate_block(program, &method.name, body, &mut diagnostics);
    }
    diagnostics
}

fn validate_block(
    program: &Program,
    method: &str,
    block: &Block,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Call {
                targets,
                method: callee,
                args,
            } => match program.method(callee) {
                None => diagnostics.push(Diagnostic::error(
                    format!("method `{}` calls undeclared method `{}`", method, callee),
                    Span::dummy(),
                )),
                Some(decl) => {
                    if decl.params.len() != args.len() || decl.returns.len() != targets.len() {
                        diagnostics.push(Diagnostic::error(
                            format!("call to `{}` in `{}` has mismatched arity", callee, method),
                            Span::dummy(),
                        ));
                    }
                }
            },
            Stmt::Write { field, .. } => {
                if program.field(field).is_none() {
                    diagnostics.push(Diagnostic::error(
                        format!("write to undeclared field `{}` in `{}`", field, method),
                        Span::dummy(),
                    ));
                }
            }
            Stmt::While { body, .. } => validate_block(program, method, body, diagnostics),
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                validate_block(program, method, then_block, diagnostics);
                if let Some(block) = else_block {
                    validate_block(program, method, block, diagnostics);
                }
            }
            _ => {}
        }
    }
}
