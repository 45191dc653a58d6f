use super::Parser;
use crate::ast::{Node, NodeKind, Segment};
use crate::error::ScriptError;
use crate::lexer::{StrPart, Token};

/// Binary operator levels from loosest to tightest. `||` and `&&` produce
/// `Or` / `And` nodes; everything else is a `Binary`.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["<=>", "==", "===", "!=", "=~", "!~"],
    &["<", "<=", ">", ">="],
    &["|", "^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

const OP_ASSIGN: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "**=", "||=", "&&=", "|=", "&=", "^=", "<<=", ">>=",
];

impl<'a> Parser<'a> {
    // -- Assignment ---------------------------------------------

    /// Assignment level. Right-associative, so `a = b = 1` nests.
    pub(super) fn parse_expr(&mut self) -> Result<Node, ScriptError> {
        self.nested(|p| p.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<Node, ScriptError> {
        let lhs = self.parse_ternary()?;
        let line = lhs.line;
        let op = match self.peek() {
            Token::Op(op) if op == "=" || OP_ASSIGN.contains(&op.as_str()) => op.clone(),
            _ => return Ok(lhs),
        };
        let target = self.assignment_target(lhs)?;
        self.advance();
        self.skip_newlines();
        let value = Box::new(self.parse_expr()?);
        let kind = if op == "=" {
            NodeKind::Assign {
                target: Box::new(target),
                value,
            }
        } else {
            NodeKind::OpAssign {
                target: Box::new(target),
                op: op.trim_end_matches('=').to_owned(),
                value,
            }
        };
        Ok(Node::new(kind, line))
    }

    /// Validate the left-hand side of an assignment. A bare identifier
    /// becomes a local variable from here on.
    fn assignment_target(&mut self, lhs: Node) -> Result<Node, ScriptError> {
        let assignable = match &lhs.kind {
            NodeKind::Call {
                recv: None,
                name,
                args,
                ..
            } if args.is_empty() => {
                let name = name.clone();
                self.declare(&name);
                return Ok(Node::new(NodeKind::LVar(name), lhs.line));
            }
            NodeKind::Call { args, .. } => args.is_empty(),
            NodeKind::LVar(_)
            | NodeKind::IVar(_)
            | NodeKind::CVar(_)
            | NodeKind::GVar(_)
            | NodeKind::Const { .. }
            | NodeKind::Index { .. } => true,
            _ => false,
        };
        if assignable {
            Ok(lhs)
        } else {
            Err(self.err("invalid assignment target"))
        }
    }

    // -- Operators ----------------------------------------------

    pub(super) fn parse_ternary(&mut self) -> Result<Node, ScriptError> {
        let cond = self.parse_range()?;
        if !self.is_op("?") {
            return Ok(cond);
        }
        let line = self.cur_line();
        self.advance();
        self.skip_newlines();
        let then_value = self.nested(|p| p.parse_ternary())?;
        self.skip_newlines();
        if !self.eat_op(":") {
            return Err(self.err(format!("expected ':' in ternary, got {:?}", self.peek())));
        }
        self.skip_newlines();
        let else_value = self.nested(|p| p.parse_ternary())?;
        Ok(Node::new(
            NodeKind::Ternary {
                cond: Box::new(cond),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            line,
        ))
    }

    fn parse_range(&mut self) -> Result<Node, ScriptError> {
        let lo = self.parse_binary(0)?;
        let exclusive = if self.is_op("..") {
            false
        } else if self.is_op("...") {
            true
        } else {
            return Ok(lo);
        };
        let line = self.cur_line();
        self.advance();
        let hi = if self.can_start_expression() {
            Some(Box::new(self.parse_binary(0)?))
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::Range {
                lo: Some(Box::new(lo)),
                hi,
                exclusive,
            },
            line,
        ))
    }

    fn parse_binary(&mut self, level: usize) -> Result<Node, ScriptError> {
        if level == BINARY_LEVELS.len() {
            return self.parse_unary_minus();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Token::Op(op) if self.no_pipe && op == "|" => break,
                Token::Op(op) if BINARY_LEVELS[level].contains(&op.as_str()) => op.clone(),
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            self.skip_newlines();
            let right = Box::new(self.parse_binary(level + 1)?);
            let kind = match op.as_str() {
                "||" => NodeKind::Or(Box::new(left), right),
                "&&" => NodeKind::And(Box::new(left), right),
                _ => NodeKind::Binary {
                    op,
                    lhs: Box::new(left),
                    rhs: right,
                },
            };
            left = Node::new(kind, line);
        }
        Ok(left)
    }

    /// Unary minus binds looser than `**`; a minus glued to a number is
    /// folded into the literal unless `**` follows (`-2 ** 2` is
    /// `-(2 ** 2)`).
    fn parse_unary_minus(&mut self) -> Result<Node, ScriptError> {
        if !self.is_op("-") {
            return self.parse_pow();
        }
        let line = self.cur_line();
        let glued = !self.spanned_at(1).space_before
            && !matches!(self.peek_at(2), Token::Op(op) if op == "**");
        let literal = match self.peek_at(1) {
            Token::Int(n) if glued => Some(NodeKind::Int(-n)),
            Token::Float(f) if glued => Some(NodeKind::Float(-f)),
            _ => None,
        };
        if let Some(kind) = literal {
            self.advance();
            self.advance();
            let node = self.parse_postfix(Node::new(kind, line))?;
            return self.parse_pow_rest(node);
        }
        self.advance();
        let operand = self.nested(|p| p.parse_unary_minus())?;
        Ok(Node::new(
            NodeKind::Unary {
                op: "-".into(),
                operand: Box::new(operand),
            },
            line,
        ))
    }

    fn parse_pow(&mut self) -> Result<Node, ScriptError> {
        let base = self.parse_unary()?;
        self.parse_pow_rest(base)
    }

    fn parse_pow_rest(&mut self, base: Node) -> Result<Node, ScriptError> {
        if !self.is_op("**") {
            return Ok(base);
        }
        let line = self.cur_line();
        self.advance();
        self.skip_newlines();
        let exponent = self.nested(|p| p.parse_unary_minus())?;
        Ok(Node::new(
            NodeKind::Binary {
                op: "**".into(),
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            },
            line,
        ))
    }

    fn parse_unary(&mut self) -> Result<Node, ScriptError> {
        let line = self.cur_line();
        if self.eat_op("!") {
            let operand = self.nested(|p| p.parse_unary())?;
            return Ok(Node::new(NodeKind::Not(Box::new(operand)), line));
        }
        for op in ["~", "+"] {
            if self.eat_op(op) {
                let operand = self.nested(|p| p.parse_unary())?;
                return Ok(Node::new(
                    NodeKind::Unary {
                        op: op.into(),
                        operand: Box::new(operand),
                    },
                    line,
                ));
            }
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    /// True when the current token can begin an expression.
    pub(super) fn can_start_expression(&self) -> bool {
        match self.peek() {
            Token::Newline | Token::Semi | Token::Eof => false,
            Token::RParen | Token::RBracket | Token::RBrace | Token::Comma | Token::Arrow => false,
            Token::Word(w) => !super::ARG_STOP_WORDS.contains(&w.as_str()),
            Token::Op(op) => matches!(op.as_str(), "-" | "!" | "~" | "*" | "**" | "&" | "::"),
            _ => true,
        }
    }

    // -- Postfix ------------------------------------------------

    /// Method calls, `::` lookups and indexing applied to `node`.
    pub(super) fn parse_postfix(&mut self, mut node: Node) -> Result<Node, ScriptError> {
        loop {
            // `foo\n  .bar` continues the chain
            if self.peek() == &Token::Newline {
                let mut offset = 1;
                while self.peek_at(offset) == &Token::Newline {
                    offset += 1;
                }
                if matches!(self.peek_at(offset), Token::Dot | Token::SafeNav) {
                    self.skip_newlines();
                } else {
                    break;
                }
            }
            match self.peek() {
                Token::Dot | Token::SafeNav => {
                    let safe_nav = self.peek() == &Token::SafeNav;
                    self.advance();
                    self.skip_newlines();
                    let line = self.cur_line();
                    let name = match self.peek().clone() {
                        Token::Word(w) | Token::Const(w) => {
                            self.advance();
                            w
                        }
                        // `proc.()` shorthand
                        Token::LParen => "call".to_owned(),
                        other => {
                            return Err(self.err(format!("expected method name, got {:?}", other)))
                        }
                    };
                    node = self.parse_call_rest(Some(node), name, safe_nav, line)?;
                }
                Token::ColonColon => {
                    self.advance();
                    let line = self.cur_line();
                    match self.peek().clone() {
                        Token::Const(name)
                            if !(self.peek_at(1) == &Token::LParen
                                && !self.spanned_at(1).space_before) =>
                        {
                            self.advance();
                            node = Node::new(
                                NodeKind::Const {
                                    scope: Some(Box::new(node)),
                                    name,
                                },
                                line,
                            );
                        }
                        Token::Word(name) | Token::Const(name) => {
                            self.advance();
                            node = self.parse_call_rest(Some(node), name, false, line)?;
                        }
                        other => {
                            return Err(self.err(format!("expected name after '::', got {:?}", other)))
                        }
                    }
                }
                Token::LBracket if !self.cur().space_before => {
                    let line = self.cur_line();
                    self.advance();
                    let args = self.parse_bracket_items(Token::RBracket, "]")?;
                    node = Node::new(
                        NodeKind::Index {
                            recv: Box::new(node),
                            args,
                        },
                        line,
                    );
                }
                _ => break,
            }
        }
        Ok(node)
    }

    // -- Primary ------------------------------------------------

    pub(super) fn parse_primary(&mut self) -> Result<Node, ScriptError> {
        let line = self.cur_line();
        let token = self.peek().clone();
        let kind = match token {
            Token::Int(n) => {
                self.advance();
                NodeKind::Int(n)
            }
            Token::BigInt(digits) => {
                self.advance();
                NodeKind::BigInt(digits)
            }
            Token::Float(f) => {
                self.advance();
                NodeKind::Float(f)
            }
            Token::Str(mut parts) => {
                self.advance();
                // `"a" "b"` is a single literal
                while let Token::Str(next) = self.peek().clone() {
                    self.advance();
                    append_parts(&mut parts, next);
                }
                return self.string_node(parts, line);
            }
            Token::XStr(parts) => {
                self.advance();
                NodeKind::XStr(self.segments(parts)?)
            }
            Token::Symbol(s) => {
                self.advance();
                NodeKind::Sym(s)
            }
            Token::Words { symbols, items } => {
                self.advance();
                let items = items
                    .into_iter()
                    .map(|item| {
                        let kind = if symbols {
                            NodeKind::Sym(item)
                        } else {
                            NodeKind::Str(item)
                        };
                        Node::new(kind, line)
                    })
                    .collect();
                NodeKind::Array(items)
            }
            Token::Regex { source, flags } => {
                self.advance();
                NodeKind::Regex { source, flags }
            }
            Token::IVar(n) => {
                self.advance();
                NodeKind::IVar(n)
            }
            Token::CVar(n) => {
                self.advance();
                NodeKind::CVar(n)
            }
            Token::GVar(n) => {
                self.advance();
                NodeKind::GVar(n)
            }
            Token::Const(name) => {
                self.advance();
                if self.peek() == &Token::LParen && !self.cur().space_before {
                    return self.parse_call_rest(None, name, false, line);
                }
                NodeKind::Const { scope: None, name }
            }
            Token::ColonColon => {
                self.advance();
                match self.peek().clone() {
                    Token::Const(name) => {
                        self.advance();
                        NodeKind::Const { scope: None, name }
                    }
                    _ => return Err(self.unexpected()),
                }
            }
            Token::LParen => {
                self.advance();
                let mut body = self.with_do_allowed(|p| p.parse_statements(&[]))?;
                self.skip_terms();
                self.expect(Token::RParen, ")")?;
                // A single parenthesized expression is just that expression.
                if body.len() == 1 {
                    if let Some(only) = body.pop() {
                        return Ok(only);
                    }
                }
                if body.is_empty() {
                    NodeKind::Nil
                } else {
                    NodeKind::Paren(body)
                }
            }
            Token::LBracket => {
                self.advance();
                NodeKind::Array(self.parse_bracket_items(Token::RBracket, "]")?)
            }
            Token::LBrace => {
                self.advance();
                NodeKind::Hash {
                    pairs: self.parse_hash_body()?,
                    braced: true,
                }
            }
            Token::Lambda => {
                self.advance();
                return self.parse_lambda(line);
            }
            Token::Op(ref op) if op == ".." || op == "..." => {
                let exclusive = op == "...";
                self.advance();
                let hi = self.parse_binary(0)?;
                NodeKind::Range {
                    lo: None,
                    hi: Some(Box::new(hi)),
                    exclusive,
                }
            }
            Token::Word(w) => return self.parse_word(w, line),
            _ => return Err(self.unexpected()),
        };
        Ok(Node::new(kind, line))
    }

    /// Keywords, local variables and receiverless method calls.
    fn parse_word(&mut self, w: String, line: u32) -> Result<Node, ScriptError> {
        let simple = match w.as_str() {
            "nil" => Some(NodeKind::Nil),
            "true" => Some(NodeKind::True),
            "false" => Some(NodeKind::False),
            "self" => Some(NodeKind::SelfRef),
            "redo" => Some(NodeKind::Redo),
            "retry" => Some(NodeKind::Retry),
            _ => None,
        };
        if let Some(kind) = simple {
            self.advance();
            return Ok(Node::new(kind, line));
        }
        match w.as_str() {
            "if" | "unless" | "while" | "until" | "case" | "begin" | "def" | "class" | "module"
            | "for" => {
                self.advance();
                return self.parse_control(&w, line);
            }
            "return" | "next" | "break" => {
                self.advance();
                let value = if self.can_start_expression() {
                    Some(Box::new(self.parse_expr()?))
                } else {
                    None
                };
                let kind = match w.as_str() {
                    "return" => NodeKind::Return(value),
                    "next" => NodeKind::Next(value),
                    _ => NodeKind::Break(value),
                };
                return Ok(Node::new(kind, line));
            }
            "yield" => {
                self.advance();
                let args = self.parse_call_args()?.unwrap_or_default();
                return Ok(Node::new(NodeKind::Yield(args), line));
            }
            "super" => {
                self.advance();
                let args = self.parse_call_args()?;
                return Ok(Node::new(NodeKind::Super(args), line));
            }
            "defined?" => {
                self.advance();
                let paren = self.eat(&Token::LParen);
                let operand = self.parse_expr()?;
                if paren {
                    self.expect(Token::RParen, ")")?;
                }
                return Ok(Node::new(NodeKind::Defined(Box::new(operand)), line));
            }
            "not" => {
                self.advance();
                let operand = self.parse_expr()?;
                return Ok(Node::new(NodeKind::Not(Box::new(operand)), line));
            }
            "end" | "then" | "do" | "else" | "elsif" | "when" | "rescue" | "ensure" | "in"
            | "and" | "or" => return Err(self.unexpected()),
            _ => {}
        }
        self.advance();
        let paren_call = self.peek() == &Token::LParen && !self.cur().space_before;
        if self.is_local(&w) && !paren_call {
            return Ok(Node::new(NodeKind::LVar(w), line));
        }
        self.parse_call_rest(None, w, false, line)
    }

    // -- Strings ------------------------------------------------

    fn segments(&mut self, parts: Vec<StrPart>) -> Result<Vec<Segment>, ScriptError> {
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                StrPart::Lit(s) => segments.push(Segment::Lit(s)),
                StrPart::Interp { source, line } => {
                    let body = self.parse_interpolation(&source, line)?;
                    segments.push(Segment::Code(body));
                }
            }
        }
        Ok(segments)
    }

    /// A plain string collapses to `Str`; anything with an interpolation
    /// stays a `DStr`.
    fn string_node(&mut self, parts: Vec<StrPart>, line: u32) -> Result<Node, ScriptError> {
        let segments = self.segments(parts)?;
        let plain = segments.iter().all(|s| matches!(s, Segment::Lit(_)));
        let kind = if plain {
            let mut text = String::new();
            for segment in segments {
                if let Segment::Lit(s) = segment {
                    text.push_str(&s);
                }
            }
            NodeKind::Str(text)
        } else {
            NodeKind::DStr(segments)
        };
        Ok(Node::new(kind, line))
    }
}

/// Concatenate string parts, merging neighbouring literals and dropping
/// empty ones.
fn append_parts(parts: &mut Vec<StrPart>, next: Vec<StrPart>) {
    for part in next {
        if let StrPart::Lit(s) = &part {
            if s.is_empty() {
                continue;
            }
            if let Some(StrPart::Lit(prev)) = parts.last_mut() {
                prev.push_str(s);
                continue;
            }
        }
        parts.push(part);
    }
    if parts.len() > 1 {
        parts.retain(|p| !matches!(p, StrPart::Lit(s) if s.is_empty()));
    }
}
