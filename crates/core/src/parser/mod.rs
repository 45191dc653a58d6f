//! Recursive-descent parser for the Ruby subset used by Fastfiles.
//!
//! Produces the generic tree in [`crate::ast`]. Nothing here knows about
//! lanes or platforms; that is the tree builder's job.

use crate::ast::{Node, NodeKind};
use crate::error::ScriptError;
use crate::lexer::{Spanned, Token};
use std::collections::HashSet;

mod calls;
mod control;
mod expressions;

/// Parse a token stream into the top-level statement list of a script.
pub fn parse(tokens: &[Spanned], filename: &str) -> Result<Vec<Node>, ScriptError> {
    let mut parser = Parser::new(tokens, filename, vec![Scope::hard()]);
    parser.parse_program()
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Local variable scope. Blocks open soft scopes that see the enclosing
/// locals; `def`, `class` and `module` open hard ones that don't.
#[derive(Debug, Clone)]
struct Scope {
    names: HashSet<String>,
    hard: bool,
}

impl Scope {
    fn hard() -> Self {
        Scope {
            names: HashSet::new(),
            hard: true,
        }
    }

    fn soft() -> Self {
        Scope {
            names: HashSet::new(),
            hard: false,
        }
    }
}

/// Deepest expression nesting accepted before giving up with a syntax
/// error instead of exhausting the stack.
const MAX_NESTING: usize = 64;

/// Words that end a command call's argument list.
const ARG_STOP_WORDS: &[&str] = &[
    "end", "do", "then", "and", "or", "if", "unless", "while", "until", "rescue", "ensure", "else",
    "elsif", "when", "in",
];

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
    scopes: Vec<Scope>,
    /// Non-zero while parsing a `while`/`until`/`for` header, where `do`
    /// belongs to the loop rather than to a call.
    no_do: usize,
    /// Set inside `|...|` block parameters, where `|` closes the list.
    no_pipe: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str, scopes: Vec<Scope>) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
            scopes,
            no_do: 0,
            no_pipe: false,
            depth: 0,
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn spanned_at(&self, offset: usize) -> &Spanned {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> ScriptError {
        ScriptError::syntax(&self.filename, self.cur_line(), msg)
    }

    fn unexpected(&self) -> ScriptError {
        match self.peek() {
            Token::Eof => self.err("unexpected end of input"),
            Token::Newline => self.err("unexpected end of line"),
            Token::Word(w) => self.err(format!("unexpected '{}'", w)),
            other => self.err(format!("unexpected token {:?}", other)),
        }
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Token::Op(x) if x == op)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, w: &str) -> bool {
        if self.is_word(w) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, desc: &str) -> Result<(), ScriptError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{}', got {:?}", desc, self.peek())))
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<u32, ScriptError> {
        let line = self.cur_line();
        if self.eat_word(expected) {
            Ok(line)
        } else {
            Err(self.err(format!("expected '{}', got {:?}", expected, self.peek())))
        }
    }

    fn take_word(&mut self) -> Result<String, ScriptError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected identifier, got {:?}", self.peek())))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    fn skip_terms(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semi) {
            self.advance();
        }
    }

    // -- Local variables ----------------------------------------

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_owned());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) {
                return true;
            }
            if scope.hard {
                break;
            }
        }
        false
    }

    fn with_scope<T>(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Run `f` with `do` attaching to calls again (inside brackets).
    fn with_do_allowed<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        let saved = std::mem::replace(&mut self.no_do, 0);
        let result = f(self);
        self.no_do = saved;
        result
    }

    /// Run `f` with `do` left for the enclosing construct: a loop header,
    /// or the command call whose arguments are being parsed.
    fn without_do<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        self.no_do += 1;
        let result = f(self);
        self.no_do -= 1;
        result
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        if self.depth >= MAX_NESTING {
            return Err(self.err(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // -- Statements ---------------------------------------------

    fn parse_program(&mut self) -> Result<Vec<Node>, ScriptError> {
        let body = self.parse_statements(&[])?;
        if self.peek() != &Token::Eof {
            return Err(self.unexpected());
        }
        Ok(body)
    }

    fn at_body_end(&self, terminators: &[&str]) -> bool {
        match self.peek() {
            Token::Eof | Token::RBrace | Token::RParen => true,
            Token::Word(w) => terminators.contains(&w.as_str()),
            _ => false,
        }
    }

    /// Parse statements until EOF, a closing bracket, or one of the given
    /// keywords. The terminator itself is not consumed.
    fn parse_statements(&mut self, terminators: &[&str]) -> Result<Vec<Node>, ScriptError> {
        let mut body = Vec::new();
        loop {
            self.skip_terms();
            if self.at_body_end(terminators) {
                break;
            }
            body.push(self.parse_statement()?);
            match self.peek() {
                Token::Newline | Token::Semi => {}
                _ if self.at_body_end(terminators) => {}
                _ => return Err(self.unexpected()),
            }
        }
        Ok(body)
    }

    /// A statement: an expression followed by any number of `if`, `unless`,
    /// `while`, `until` or `rescue` modifiers.
    fn parse_statement(&mut self) -> Result<Node, ScriptError> {
        let mut node = if self.looks_like_multi_assign() {
            self.parse_multi_assign()?
        } else {
            self.parse_expr_statement()?
        };
        loop {
            let line = self.cur_line();
            let modifier = match self.peek() {
                Token::Word(w) => w.clone(),
                _ => break,
            };
            let kind = match modifier.as_str() {
                "if" | "unless" | "while" | "until" => {
                    self.advance();
                    let cond = Box::new(self.parse_expr_statement()?);
                    match modifier.as_str() {
                        "if" => NodeKind::If {
                            cond,
                            then_body: vec![node],
                            else_body: None,
                        },
                        "unless" => NodeKind::Unless {
                            cond,
                            body: vec![node],
                            else_body: None,
                        },
                        _ => NodeKind::While {
                            cond,
                            body: vec![node],
                            until: modifier == "until",
                        },
                    }
                }
                "rescue" => {
                    self.advance();
                    let fallback = self.parse_expr_statement()?;
                    NodeKind::Begin {
                        body: vec![node],
                        rescues: vec![crate::ast::Rescue {
                            classes: Vec::new(),
                            var: None,
                            body: vec![fallback],
                        }],
                        else_body: None,
                        ensure: None,
                    }
                }
                _ => break,
            };
            node = Node::new(kind, line);
        }
        Ok(node)
    }

    /// `not` and the low-precedence `and` / `or`.
    fn parse_expr_statement(&mut self) -> Result<Node, ScriptError> {
        let mut left = self.parse_not_expr()?;
        loop {
            let line = self.cur_line();
            let is_and = if self.is_word("and") {
                true
            } else if self.is_word("or") {
                false
            } else {
                break;
            };
            self.advance();
            self.skip_newlines();
            let right = Box::new(self.parse_not_expr()?);
            let kind = if is_and {
                NodeKind::And(Box::new(left), right)
            } else {
                NodeKind::Or(Box::new(left), right)
            };
            left = Node::new(kind, line);
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Node, ScriptError> {
        if self.is_word("not") {
            let line = self.cur_line();
            self.advance();
            let operand = self.nested(|p| p.parse_not_expr())?;
            return Ok(Node::new(NodeKind::Not(Box::new(operand)), line));
        }
        self.parse_expr()
    }

    // -- Multiple assignment ------------------------------------

    fn is_multi_assign_target(&self, offset: usize) -> Option<usize> {
        match self.peek_at(offset) {
            Token::Word(w) if !ARG_STOP_WORDS.contains(&w.as_str()) => Some(1),
            Token::IVar(_) | Token::GVar(_) | Token::CVar(_) => Some(1),
            Token::Op(op) if op == "*" => match self.peek_at(offset + 1) {
                Token::Word(_) => Some(2),
                _ => None,
            },
            _ => None,
        }
    }

    /// `a, b = ...` at statement start.
    fn looks_like_multi_assign(&self) -> bool {
        let mut offset = 0;
        let mut targets = 0;
        loop {
            match self.is_multi_assign_target(offset) {
                Some(len) => offset += len,
                None => return false,
            }
            targets += 1;
            match self.peek_at(offset) {
                Token::Comma => offset += 1,
                Token::Op(op) if op == "=" => return targets > 1,
                _ => return false,
            }
        }
    }

    fn parse_multi_assign(&mut self) -> Result<Node, ScriptError> {
        let line = self.cur_line();
        let mut targets = Vec::new();
        loop {
            let target_line = self.cur_line();
            let splat = self.eat_op("*");
            let target = match self.advance().token.clone() {
                Token::Word(w) => {
                    self.declare(&w);
                    NodeKind::LVar(w)
                }
                Token::IVar(n) => NodeKind::IVar(n),
                Token::GVar(n) => NodeKind::GVar(n),
                Token::CVar(n) => NodeKind::CVar(n),
                other => return Err(self.err(format!("invalid assignment target {:?}", other))),
            };
            let mut target = Node::new(target, target_line);
            if splat {
                target = Node::new(NodeKind::Splat(Box::new(target)), target_line);
            }
            targets.push(target);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if !self.eat_op("=") {
            return Err(self.err(format!("expected '=', got {:?}", self.peek())));
        }
        self.skip_newlines();
        let first = self.parse_expr()?;
        let value = if self.peek() == &Token::Comma {
            let value_line = first.line;
            let mut items = vec![first];
            while self.eat(&Token::Comma) {
                self.skip_newlines();
                items.push(self.parse_call_arg()?);
            }
            Node::new(NodeKind::Array(items), value_line)
        } else {
            first
        };
        Ok(Node::new(
            NodeKind::MultiAssign {
                targets,
                value: Box::new(value),
            },
            line,
        ))
    }

    // -- String interpolation -----------------------------------

    /// Parse the source of one `#{...}` interpolation. The nested parser
    /// sees the enclosing locals.
    fn parse_interpolation(&mut self, source: &str, line: u32) -> Result<Vec<Node>, ScriptError> {
        let tokens = crate::lexer::lex_from(source, &self.filename, line)?;
        let mut nested = Parser::new(&tokens, &self.filename, self.scopes.clone());
        nested.depth = self.depth + 1;
        let body = nested.parse_program()?;
        // Assignments inside interpolations leak into the enclosing scope.
        if let (Some(outer), Some(inner)) = (self.scopes.last_mut(), nested.scopes.last()) {
            outer.names.extend(inner.names.iter().cloned());
        }
        Ok(body)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
