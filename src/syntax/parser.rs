use crate::diagnostic::Diagnostic;
use crate::ir::{
    BinOp, Block, Expr, FieldDecl, Method, Param, PredicateDecl, Program, SpecClause, Stmt, Type,
    UnOp,
};
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 128;

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn parse_program(mut self) -> Result<Program, Vec<Diagnostic>> {
        let mut program = Program::default();
        while !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Field) {
                if let Some(field) = self.parse_field() {
                    program.fields.push(field);
                }
            } else if self.at(&Lexeme::Predicate) {
                if let Some(pred) = self.parse_predicate() {
                    program.predicates.push(pred);
                }
            } else if self.at(&Lexeme::Method) {
                if let Some(method) = self.parse_method() {
                    program.methods.push(method);
                }
            } else {
                self.error_here("expected `field`, `predicate`, or `method` declaration");
                break;
            }
            if !self.diagnostics.is_empty() {
                break;
            }
        }
        if self.diagnostics.is_empty() {
            Ok(program)
        } else {
            Err(self.diagnostics)
        }
    }

    // ─── Declarations ──────────────────────────────────────────────

    fn parse_field(&mut self) -> Option<FieldDecl> {
        self.expect(&Lexeme::Field)?;
        let name = self.expect_ident()?;
        self.expect(&Lexeme::Colon)?;
        let ty = self.parse_type()?;
        Some(FieldDecl { name, ty })
    }

    fn parse_predicate(&mut self) -> Option<PredicateDecl> {
        self.expect(&Lexeme::Predicate)?;
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let body = if self.at(&Lexeme::LBrace) {
            self.advance();
            let body = self.parse_expr()?;
            self.expect(&Lexeme::RBrace)?;
            Some(body)
        } else {
            None
        };
        Some(PredicateDecl { name, params, body })
    }

    fn parse_method(&mut self) -> Option<Method> {
        self.expect(&Lexeme::Method)?;
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let returns = if self.eat(&Lexeme::Returns) {
            self.parse_params()?
        } else {
            Vec::new()
        };

        let mut requires = Vec::new();
        let mut ensures = Vec::new();
        loop {
            if self.eat(&Lexeme::Requires) {
                requires.push(self.parse_spec_clause()?);
            } else if self.eat(&Lexeme::Ensures) {
                ensures.push(self.parse_spec_clause()?);
            } else {
                break;
            }
        }

        let body = if self.at(&Lexeme::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Some(Method {
            name,
            params,
            returns,
            requires,
            ensures,
            body,
        })
    }

    fn parse_spec_clause(&mut self) -> Option<SpecClause> {
        if self.eat(&Lexeme::Question) {
            Some(SpecClause::Placeholder)
        } else {
            Some(SpecClause::Expr(self.parse_expr()?))
        }
    }

    fn parse_params(&mut self) -> Option<Vec<Param>> {
        self.expect(&Lexeme::LParen)?;
        let mut params = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                let name = self.expect_ident()?;
                self.expect(&Lexeme::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param { name, ty });
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(&Lexeme::RParen)?;
        Some(params)
    }

    fn parse_type(&mut self) -> Option<Type> {
        if self.eat(&Lexeme::RefTy) {
            Some(Type::Ref)
        } else if self.eat(&Lexeme::IntTy) {
            Some(Type::Int)
        } else if self.eat(&Lexeme::BoolTy) {
            Some(Type::Bool)
        } else {
            self.error_here("expected a type (`Ref`, `Int`, or `Bool`)");
            None
        }
    }

    // ─── Statements ────────────────────────────────────────────────

    fn parse_block(&mut self) -> Option<Block> {
        if !self.enter_nesting() {
            return None;
        }
        self.expect(&Lexeme::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => break,
            }
        }
        self.expect(&Lexeme::RBrace)?;
        self.exit_nesting();
        Some(Block::new(stmts))
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        if self.eat(&Lexeme::Var) {
            let name = self.expect_ident()?;
            self.expect(&Lexeme::Colon)?;
            let ty = self.parse_type()?;
            let init = if self.eat(&Lexeme::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Some(Stmt::Var { name, ty, init });
        }
        if self.eat(&Lexeme::While) {
            self.expect(&Lexeme::LParen)?;
            let cond = self.parse_expr()?;
            self.expect(&Lexeme::RParen)?;
            let mut invariants = Vec::new();
            while self.eat(&Lexeme::Invariant) {
                invariants.push(self.parse_spec_clause()?);
            }
            let body = self.parse_block()?;
            return Some(Stmt::While {
                cond,
                invariants,
                body,
            });
        }
        if self.eat(&Lexeme::If) {
            self.expect(&Lexeme::LParen)?;
            let cond = self.parse_expr()?;
            self.expect(&Lexeme::RParen)?;
            let then_block = self.parse_block()?;
            let else_block = if self.eat(&Lexeme::Else) {
                Some(self.parse_block()?)
            } else {
                None
            };
            return Some(Stmt::If {
                cond,
                then_block,
                else_block,
            });
        }
        if self.eat(&Lexeme::Inhale) {
            let expr = self.parse_expr()?;
            return Some(Stmt::Inhale { expr, info: None });
        }
        if self.eat(&Lexeme::Exhale) {
            let expr = self.parse_expr()?;
            return Some(Stmt::Exhale { expr, info: None });
        }
        if self.eat(&Lexeme::Fold) {
            let access = self.parse_resource_expr()?;
            return Some(Stmt::Fold { access });
        }
        if self.eat(&Lexeme::Unfold) {
            let access = self.parse_resource_expr()?;
            return Some(Stmt::Unfold { access });
        }
        if self.eat(&Lexeme::Assert) {
            return Some(Stmt::Assert(self.parse_expr()?));
        }
        if self.eat(&Lexeme::Assume) {
            return Some(Stmt::Assume(self.parse_expr()?));
        }
        if self.eat(&Lexeme::Label) {
            return Some(Stmt::Label(self.expect_ident()?));
        }
        if self.eat(&Lexeme::Havoc) {
            return Some(Stmt::Havoc(self.expect_ident()?));
        }
        self.parse_assign_or_call()
    }

    /// Assignment, field write, or method call; all start with an identifier.
    fn parse_assign_or_call(&mut self) -> Option<Stmt> {
        let first = self.expect_ident()?;

        // `x.f := e` (possibly through a longer path: `x.f.g := e`)
        if self.at(&Lexeme::Dot) {
            let mut path = vec![];
            while self.eat(&Lexeme::Dot) {
                path.push(self.expect_ident()?);
            }
            self.expect(&Lexeme::Assign)?;
            let value = self.parse_expr()?;
            let field = path.pop().unwrap();
            let mut receiver = Expr::var(&first);
            for part in path {
                receiver = Expr::field(receiver, &part);
            }
            return Some(Stmt::Write {
                receiver,
                field,
                value,
            });
        }

        // `a, b := m(args)`
        if self.at(&Lexeme::Comma) {
            let mut targets = vec![first];
            while self.eat(&Lexeme::Comma) {
                targets.push(self.expect_ident()?);
            }
            self.expect(&Lexeme::Assign)?;
            let method = self.expect_ident()?;
            let args = self.parse_args()?;
            return Some(Stmt::Call {
                targets,
                method,
                args,
            });
        }

        // `x := m(args)` or `x := e`
        if self.eat(&Lexeme::Assign) {
            if self.at_ident_followed_by_lparen() {
                let method = self.expect_ident()?;
                let args = self.parse_args()?;
                return Some(Stmt::Call {
                    targets: vec![first],
                    method,
                    args,
                });
            }
            let value = self.parse_expr()?;
            return Some(Stmt::Assign {
                target: first,
                value,
            });
        }

        // `m(args)`
        if self.at(&Lexeme::LParen) {
            let args = self.parse_args()?;
            return Some(Stmt::Call {
                targets: Vec::new(),
                method: first,
                args,
            });
        }

        self.error_here("expected `:=`, `.`, `,`, or `(` after identifier");
        None
    }

    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        self.expect(&Lexeme::LParen)?;
        let mut args = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(&Lexeme::RParen)?;
        Some(args)
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self) -> Option<Expr> {
        if !self.enter_nesting() {
            return None;
        }
        let e = self.parse_implies();
        self.exit_nesting();
        e
    }

    /// `==>` is right-associative and binds loosest.
    fn parse_implies(&mut self) -> Option<Expr> {
        let lhs = self.parse_or()?;
        if self.eat(&Lexeme::Implies) {
            let rhs = self.parse_implies()?;
            return Some(Expr::binary(BinOp::Implies, lhs, rhs));
        }
        Some(lhs)
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Lexeme::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::binary(BinOp::Or, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Lexeme::AndAnd) {
            let rhs = self.parse_comparison()?;
            lhs = Expr::binary(BinOp::And, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;
        let op = if self.eat(&Lexeme::EqEq) {
            BinOp::Eq
        } else if self.eat(&Lexeme::NotEq) {
            BinOp::Ne
        } else if self.eat(&Lexeme::Le) {
            BinOp::Le
        } else if self.eat(&Lexeme::Lt) {
            BinOp::Lt
        } else if self.eat(&Lexeme::Ge) {
            BinOp::Ge
        } else if self.eat(&Lexeme::Gt) {
            BinOp::Gt
        } else {
            return Some(lhs);
        };
        let rhs = self.parse_additive()?;
        Some(Expr::binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.eat(&Lexeme::Plus) {
                BinOp::Add
            } else if self.eat(&Lexeme::Minus) {
                BinOp::Sub
            } else {
                return Some(lhs);
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Lexeme::Star) {
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(BinOp::Mul, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if self.eat(&Lexeme::Bang) {
            let operand = self.parse_unary()?;
            return Some(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Lexeme::Minus) {
            let operand = self.parse_unary()?;
            return Some(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Lexeme::Dot) {
            let field = self.expect_ident()?;
            expr = Expr::Field {
                receiver: Box::new(expr),
                field,
            };
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        if self.eat(&Lexeme::LParen) {
            let expr = self.parse_expr()?;
            self.expect(&Lexeme::RParen)?;
            return Some(expr);
        }
        if self.eat(&Lexeme::Null) {
            return Some(Expr::Null);
        }
        if self.eat(&Lexeme::True) {
            return Some(Expr::Bool(true));
        }
        if self.eat(&Lexeme::False) {
            return Some(Expr::Bool(false));
        }
        if self.eat(&Lexeme::Acc) {
            self.expect(&Lexeme::LParen)?;
            let loc = self.parse_postfix_or_pred()?;
            let amount = if self.eat(&Lexeme::Comma) {
                self.expect_integer()?
            } else {
                1
            };
            self.expect(&Lexeme::RParen)?;
            if !matches!(loc, Expr::Field { .. } | Expr::Pred { .. }) {
                self.error_here("`acc` expects a field access or predicate instance");
                return None;
            }
            return Some(Expr::Acc {
                loc: Box::new(loc),
                amount,
            });
        }
        if let Lexeme::Integer(n) = self.current().node {
            self.advance();
            return Some(Expr::Int(n));
        }
        if matches!(self.current().node, Lexeme::Ident(_)) {
            return self.parse_postfix_or_pred();
        }
        self.error_here("expected an expression");
        None
    }

    /// An identifier-led location: variable, field path, or predicate instance.
    fn parse_postfix_or_pred(&mut self) -> Option<Expr> {
        let name = self.expect_ident()?;
        if self.at(&Lexeme::LParen) {
            let args = self.parse_args()?;
            return Some(Expr::Pred { name, args });
        }
        let mut expr = Expr::var(&name);
        while self.eat(&Lexeme::Dot) {
            let field = self.expect_ident()?;
            expr = Expr::Field {
                receiver: Box::new(expr),
                field,
            };
        }
        Some(expr)
    }

    /// A fold/unfold target: `p(args)` or `acc(p(args))`.
    fn parse_resource_expr(&mut self) -> Option<Expr> {
        let expr = self.parse_primary()?;
        match &expr {
            Expr::Pred { .. } => Some(Expr::acc(expr)),
            Expr::Acc { loc, .. } if matches!(**loc, Expr::Pred { .. }) => Some(expr),
            _ => {
                self.error_here("fold/unfold expects a predicate instance");
                None
            }
        }
    }

    // ─── Token Plumbing ────────────────────────────────────────────

    fn current(&self) -> &Spanned<Lexeme> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn at(&self, lexeme: &Lexeme) -> bool {
        &self.current().node == lexeme
    }

    fn at_ident_followed_by_lparen(&self) -> bool {
        matches!(self.current().node, Lexeme::Ident(_))
            && matches!(
                self.tokens.get(self.pos + 1).map(|t| &t.node),
                Some(Lexeme::LParen)
            )
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn eat(&mut self, lexeme: &Lexeme) -> bool {
        if self.at(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, lexeme: &Lexeme) -> Option<()> {
        if self.eat(lexeme) {
            Some(())
        } else {
            self.error_here(&format!(
                "expected {}, found {}",
                lexeme.describe(),
                self.current().node.describe()
            ));
            None
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        if let Lexeme::Ident(name) = self.current().node.clone() {
            self.advance();
            Some(name)
        } else {
            self.error_here(&format!(
                "expected an identifier, found {}",
                self.current().node.describe()
            ));
            None
        }
    }

    fn expect_integer(&mut self) -> Option<i64> {
        if let Lexeme::Integer(n) = self.current().node {
            self.advance();
            Some(n)
        } else {
            self.error_here(&format!(
                "expected an integer, found {}",
                self.current().node.describe()
            ));
            None
        }
    }

    fn error_here(&mut self, message: &str) {
        let span = self.current_span();
        self.diagnostics
            .push(Diagnostic::error(message.to_string(), span));
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_here("nesting depth exceeded");
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }
}
