use super::{Parser, Scope, ARG_STOP_WORDS};
use crate::ast::{Node, NodeKind, Param};
use crate::error::ScriptError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    // -- Calls --------------------------------------------------

    /// Finish a method call whose name has been consumed: arguments in
    /// parentheses or command style, then an optional block.
    pub(super) fn parse_call_rest(
        &mut self,
        recv: Option<Node>,
        name: String,
        safe_nav: bool,
        line: u32,
    ) -> Result<Node, ScriptError> {
        let paren = self.peek() == &Token::LParen && !self.cur().space_before;
        let args = if paren {
            self.advance();
            self.parse_paren_args()?
        } else if self.can_start_command_arg() {
            self.parse_command_args()?
        } else {
            Vec::new()
        };
        let command = !paren && !args.is_empty();
        let call = Node::new(
            NodeKind::Call {
                recv: recv.map(Box::new),
                name,
                args,
                safe_nav,
            },
            line,
        );
        // `foo a { }` binds the braces to `a`, not to `foo`
        let brace_block = self.peek() == &Token::LBrace && !command;
        let do_block = self.is_word("do") && self.no_do == 0;
        if brace_block || do_block {
            return self.parse_block(call);
        }
        Ok(call)
    }

    /// Arguments for `yield` / `super`, `None` when neither parentheses nor
    /// command arguments follow.
    pub(super) fn parse_call_args(&mut self) -> Result<Option<Vec<Node>>, ScriptError> {
        if self.peek() == &Token::LParen && !self.cur().space_before {
            self.advance();
            return Ok(Some(self.parse_paren_args()?));
        }
        if self.can_start_command_arg() {
            return Ok(Some(self.parse_command_args()?));
        }
        Ok(None)
    }

    /// Whether the current token starts the first argument of a command
    /// call (`gym scheme: "App"`, `puts -x`, `foo [1]`).
    fn can_start_command_arg(&self) -> bool {
        let cur = self.cur();
        let next_glued = !self.spanned_at(1).space_before;
        match &cur.token {
            Token::Int(_)
            | Token::BigInt(_)
            | Token::Float(_)
            | Token::Str(_)
            | Token::XStr(_)
            | Token::Symbol(_)
            | Token::Label(_)
            | Token::Words { .. }
            | Token::Regex { .. }
            | Token::IVar(_)
            | Token::CVar(_)
            | Token::GVar(_)
            | Token::Const(_)
            | Token::Lambda => cur.space_before,
            Token::Word(w) => cur.space_before && !ARG_STOP_WORDS.contains(&w.as_str()),
            Token::LBracket | Token::LParen => cur.space_before,
            Token::ColonColon => cur.space_before && next_glued,
            Token::Op(op) => {
                matches!(op.as_str(), "-" | "*" | "**" | "&" | "!" | "~" | "::")
                    && cur.space_before
                    && next_glued
            }
            _ => false,
        }
    }

    /// After `(`: arguments up to the closing parenthesis.
    fn parse_paren_args(&mut self) -> Result<Vec<Node>, ScriptError> {
        self.with_do_allowed(|p| {
            let mut args = Vec::new();
            p.skip_newlines();
            while p.peek() != &Token::RParen {
                args.push(p.parse_call_arg()?);
                p.skip_newlines();
                if !p.eat(&Token::Comma) {
                    break;
                }
                p.skip_newlines();
            }
            p.skip_newlines();
            p.expect(Token::RParen, ")")?;
            Ok(group_keyword_args(args))
        })
    }

    fn parse_command_args(&mut self) -> Result<Vec<Node>, ScriptError> {
        self.without_do(|p| {
            let mut args = vec![p.parse_call_arg()?];
            while p.eat(&Token::Comma) {
                p.skip_newlines();
                args.push(p.parse_call_arg()?);
            }
            Ok(group_keyword_args(args))
        })
    }

    /// One argument: a value, `key: value`, `key => value`, or a splat /
    /// block-pass form.
    pub(super) fn parse_call_arg(&mut self) -> Result<Node, ScriptError> {
        let line = self.cur_line();
        if self.eat_op("*") {
            let inner = self.parse_ternary()?;
            return Ok(Node::new(NodeKind::Splat(Box::new(inner)), line));
        }
        if self.eat_op("**") {
            let inner = self.parse_ternary()?;
            return Ok(Node::new(NodeKind::DoubleSplat(Box::new(inner)), line));
        }
        if self.eat_op("&") {
            let inner = if self.can_start_expression() {
                Some(Box::new(self.parse_ternary()?))
            } else {
                None
            };
            return Ok(Node::new(NodeKind::BlockPass(inner), line));
        }
        if let Token::Label(key) = self.peek().clone() {
            self.advance();
            self.skip_newlines();
            let value = self.parse_arg_value()?;
            return Ok(pair(Node::new(NodeKind::Sym(key), line), value, line));
        }
        let value = self.parse_arg_value()?;
        if self.eat(&Token::Arrow) {
            self.skip_newlines();
            let mapped = self.parse_arg_value()?;
            return Ok(pair(value, mapped, line));
        }
        Ok(value)
    }

    /// Argument values may be `not` expressions or assignments.
    fn parse_arg_value(&mut self) -> Result<Node, ScriptError> {
        if self.is_word("not") {
            return self.parse_primary();
        }
        self.parse_expr()
    }

    /// Items of an array literal or index, up to `close`.
    pub(super) fn parse_bracket_items(
        &mut self,
        close: Token,
        desc: &str,
    ) -> Result<Vec<Node>, ScriptError> {
        self.with_do_allowed(|p| {
            let mut items = Vec::new();
            p.skip_newlines();
            while p.peek() != &close {
                items.push(p.parse_call_arg()?);
                p.skip_newlines();
                if !p.eat(&Token::Comma) {
                    break;
                }
                p.skip_newlines();
            }
            p.expect(close, desc)?;
            Ok(group_keyword_args(items))
        })
    }

    /// After `{`: hash pairs up to the closing brace.
    pub(super) fn parse_hash_body(&mut self) -> Result<Vec<Node>, ScriptError> {
        self.with_do_allowed(|p| {
            let mut pairs = Vec::new();
            p.skip_newlines();
            while p.peek() != &Token::RBrace {
                let line = p.cur_line();
                let entry = if let Token::Label(key) = p.peek().clone() {
                    p.advance();
                    p.skip_newlines();
                    let value = p.parse_arg_value()?;
                    pair(Node::new(NodeKind::Sym(key), line), value, line)
                } else if p.eat_op("**") {
                    let inner = p.parse_ternary()?;
                    Node::new(NodeKind::DoubleSplat(Box::new(inner)), line)
                } else {
                    let key = p.parse_ternary()?;
                    p.skip_newlines();
                    p.expect(Token::Arrow, "=>")?;
                    p.skip_newlines();
                    let value = p.parse_arg_value()?;
                    pair(key, value, line)
                };
                pairs.push(entry);
                p.skip_newlines();
                if !p.eat(&Token::Comma) {
                    break;
                }
                p.skip_newlines();
            }
            p.expect(Token::RBrace, "}")?;
            Ok(pairs)
        })
    }

    // -- Blocks -------------------------------------------------

    /// Attach a `{ ... }` or `do ... end` block to `call`.
    fn parse_block(&mut self, call: Node) -> Result<Node, ScriptError> {
        let line = call.line;
        let braces = self.peek() == &Token::LBrace;
        self.advance();
        let (params, body) = self.with_scope(Scope::soft(), |p| {
            let params = p.parse_block_params()?;
            let body = if braces {
                let body = p.with_do_allowed(|p| p.parse_statements(&[]))?;
                p.expect(Token::RBrace, "}")?;
                body
            } else {
                p.with_do_allowed(|p| p.parse_body_until_end())?
            };
            Ok((params, body))
        })?;
        Ok(Node::new(
            NodeKind::Block {
                call: Box::new(call),
                params,
                body,
            },
            line,
        ))
    }

    /// `|a, b|` at the start of a block; empty when absent.
    fn parse_block_params(&mut self) -> Result<Vec<Param>, ScriptError> {
        if self.eat_op("||") {
            return Ok(Vec::new());
        }
        if !self.eat_op("|") {
            return Ok(Vec::new());
        }
        let saved = std::mem::replace(&mut self.no_pipe, true);
        let params = self.parse_param_list(|p| p.is_op("|"));
        self.no_pipe = saved;
        let params = params?;
        if !self.eat_op("|") {
            return Err(self.err(format!("expected '|', got {:?}", self.peek())));
        }
        Ok(params)
    }

    /// `->(x) { ... }` and `-> do ... end`.
    pub(super) fn parse_lambda(&mut self, line: u32) -> Result<Node, ScriptError> {
        let (params, body) = self.with_scope(Scope::soft(), |p| {
            let params = if p.eat(&Token::LParen) {
                let params = p.parse_param_list(|p| p.peek() == &Token::RParen)?;
                p.expect(Token::RParen, ")")?;
                params
            } else {
                p.parse_param_list(|p| p.peek() == &Token::LBrace || p.is_word("do"))?
            };
            let body = if p.eat(&Token::LBrace) {
                let body = p.with_do_allowed(|p| p.parse_statements(&[]))?;
                p.expect(Token::RBrace, "}")?;
                body
            } else {
                p.expect_word("do")?;
                p.with_do_allowed(|p| p.parse_body_until_end())?
            };
            Ok((params, body))
        })?;
        Ok(Node::new(NodeKind::Lambda { params, body }, line))
    }

    // -- Parameters ---------------------------------------------

    /// Comma-separated parameters until `at_end` holds. Each name is
    /// declared as a local in the current scope.
    pub(super) fn parse_param_list(
        &mut self,
        at_end: impl Fn(&Self) -> bool,
    ) -> Result<Vec<Param>, ScriptError> {
        let mut params = Vec::new();
        self.skip_newlines();
        while !at_end(self) {
            let param = self.parse_param()?;
            if let Some(name) = param.name() {
                let name = name.to_owned();
                self.declare(&name);
            }
            params.push(param);
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                break;
            }
            self.skip_newlines();
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param, ScriptError> {
        let optional_name = |p: &mut Self| match p.peek().clone() {
            Token::Word(w) => {
                p.advance();
                Some(w)
            }
            _ => None,
        };
        if self.eat_op("*") {
            return Ok(Param::Rest(optional_name(self)));
        }
        if self.eat_op("**") {
            return Ok(Param::KeyRest(optional_name(self)));
        }
        if self.eat_op("&") {
            return Ok(Param::Block(self.take_word()?));
        }
        if self.eat(&Token::LParen) {
            let inner = self.parse_param_list(|p| p.peek() == &Token::RParen)?;
            self.expect(Token::RParen, ")")?;
            return Ok(Param::Destructure(inner));
        }
        if let Token::Label(name) = self.peek().clone() {
            self.advance();
            let has_default = !matches!(
                self.peek(),
                Token::Comma | Token::RParen | Token::Newline | Token::Semi
            ) && !self.is_op("|");
            if has_default {
                let default = self.parse_ternary()?;
                return Ok(Param::KeyOpt(name, default));
            }
            return Ok(Param::Key(name));
        }
        let name = self.take_word()?;
        if self.eat_op("=") {
            let default = self.parse_ternary()?;
            return Ok(Param::Opt(name, default));
        }
        Ok(Param::Req(name))
    }
}

fn pair(key: Node, value: Node, line: u32) -> Node {
    Node::new(
        NodeKind::Pair {
            key: Box::new(key),
            value: Box::new(value),
        },
        line,
    )
}

/// Collect `key: value` arguments into one unbraced hash, placed where the
/// first of them appeared.
fn group_keyword_args(args: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(args.len());
    let mut hash_at: Option<usize> = None;
    for arg in args {
        let keyword = matches!(arg.kind, NodeKind::Pair { .. } | NodeKind::DoubleSplat(_));
        if !keyword {
            out.push(arg);
            continue;
        }
        match hash_at {
            Some(i) => {
                if let NodeKind::Hash { pairs, .. } = &mut out[i].kind {
                    pairs.push(arg);
                }
            }
            None => {
                hash_at = Some(out.len());
                let line = arg.line;
                out.push(Node::new(
                    NodeKind::Hash {
                        pairs: vec![arg],
                        braced: false,
                    },
                    line,
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(kind: NodeKind) -> Node {
        Node::new(kind, 1)
    }

    #[test]
    fn keyword_args_are_grouped_into_one_hash() {
        let args = vec![
            n(NodeKind::Str("x".into())),
            pair(n(NodeKind::Sym("a".into())), n(NodeKind::Int(1)), 1),
            pair(n(NodeKind::Sym("b".into())), n(NodeKind::Int(2)), 1),
        ];
        let grouped = group_keyword_args(args);
        assert_eq!(grouped.len(), 2);
        match &grouped[1].kind {
            NodeKind::Hash { pairs, braced } => {
                assert_eq!(pairs.len(), 2);
                assert!(!braced);
            }
            other => panic!("expected hash, got {:?}", other),
        }
    }

    #[test]
    fn positional_args_stay_in_order() {
        let args = vec![n(NodeKind::Int(1)), n(NodeKind::Int(2))];
        assert_eq!(group_keyword_args(args.clone()), args);
    }
}
