use crate::diagnostic::Diagnostic;
use crate::syntax::lexeme::Lexeme;
use crate::syntax::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol recorded an error; skip the byte and retry
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        let lexeme = match text {
            "field" => Lexeme::Field,
            "predicate" => Lexeme::Predicate,
            "method" => Lexeme::Method,
            "returns" => Lexeme::Returns,
            "requires" => Lexeme::Requires,
            "ensures" => Lexeme::Ensures,
            "invariant" => Lexeme::Invariant,
            "var" => Lexeme::Var,
            "while" => Lexeme::While,
            "if" => Lexeme::If,
            "else" => Lexeme::Else,
            "inhale" => Lexeme::Inhale,
            "exhale" => Lexeme::Exhale,
            "fold" => Lexeme::Fold,
            "unfold" => Lexeme::Unfold,
            "assert" => Lexeme::Assert,
            "assume" => Lexeme::Assume,
            "label" => Lexeme::Label,
            "havoc" => Lexeme::Havoc,
            "acc" => Lexeme::Acc,
            "null" => Lexeme::Null,
            "true" => Lexeme::True,
            "false" => Lexeme::False,
            "Ref" => Lexeme::RefTy,
            "Int" => Lexeme::IntTy,
            "Bool" => Lexeme::BoolTy,
            _ => Lexeme::Ident(text.to_string()),
        };
        self.make_token(lexeme, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("0");
        match text.parse::<i64>() {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    format!("integer literal `{}` is out of range", text),
                    Span::new(start as u32, self.pos as u32),
                ));
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        let next = self.source.get(self.pos + 1).copied();
        let next2 = self.source.get(self.pos + 2).copied();

        let (lexeme, len) = match (ch, next, next2) {
            (b'=', Some(b'='), Some(b'>')) => (Lexeme::Implies, 3),
            (b'=', Some(b'='), _) => (Lexeme::EqEq, 2),
            (b'!', Some(b'='), _) => (Lexeme::NotEq, 2),
            (b'<', Some(b'='), _) => (Lexeme::Le, 2),
            (b'>', Some(b'='), _) => (Lexeme::Ge, 2),
            (b':', Some(b'='), _) => (Lexeme::Assign, 2),
            (b'&', Some(b'&'), _) => (Lexeme::AndAnd, 2),
            (b'|', Some(b'|'), _) => (Lexeme::OrOr, 2),
            (b'(', _, _) => (Lexeme::LParen, 1),
            (b')', _, _) => (Lexeme::RParen, 1),
            (b'{', _, _) => (Lexeme::LBrace, 1),
            (b'}', _, _) => (Lexeme::RBrace, 1),
            (b',', _, _) => (Lexeme::Comma, 1),
            (b':', _, _) => (Lexeme::Colon, 1),
            (b'.', _, _) => (Lexeme::Dot, 1),
            (b'?', _, _) => (Lexeme::Question, 1),
            (b'<', _, _) => (Lexeme::Lt, 1),
            (b'>', _, _) => (Lexeme::Gt, 1),
            (b'+', _, _) => (Lexeme::Plus, 1),
            (b'-', _, _) => (Lexeme::Minus, 1),
            (b'*', _, _) => (Lexeme::Star, 1),
            (b'!', _, _) => (Lexeme::Bang, 1),
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    format!("unexpected character `{}`", ch as char),
                    Span::new(start as u32, start as u32 + 1),
                ));
                self.pos += 1;
                return None;
            }
        };
        self.pos += len;
        Some(self.make_token(lexeme, start, self.pos))
    }

    fn make_token(&self, lexeme: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(lexeme, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
