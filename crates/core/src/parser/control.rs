use super::{Parser, Scope};
use crate::ast::{Node, NodeKind, Rescue, When};
use crate::error::ScriptError;
use crate::lexer::Token;

/// Clauses that may follow the main body of `begin`, `def` and `do` blocks.
const BODY_CLAUSES: &[&str] = &["rescue", "else", "ensure", "end"];

struct Clauses {
    body: Vec<Node>,
    rescues: Vec<Rescue>,
    else_body: Option<Vec<Node>>,
    ensure: Option<Vec<Node>>,
}

impl<'a> Parser<'a> {
    /// Keyword-introduced constructs; the keyword has been consumed.
    pub(super) fn parse_control(&mut self, keyword: &str, line: u32) -> Result<Node, ScriptError> {
        match keyword {
            "if" => self.parse_if(line),
            "unless" => self.parse_unless(line),
            "while" => self.parse_while(line, false),
            "until" => self.parse_while(line, true),
            "for" => self.parse_for(line),
            "case" => self.parse_case(line),
            "begin" => {
                let clauses = self.parse_clauses()?;
                Ok(Node::new(
                    NodeKind::Begin {
                        body: clauses.body,
                        rescues: clauses.rescues,
                        else_body: clauses.else_body,
                        ensure: clauses.ensure,
                    },
                    line,
                ))
            }
            "def" => self.parse_def(line),
            "class" => self.parse_class(line),
            "module" => self.parse_module(line),
            other => Err(self.err(format!("unexpected '{}'", other))),
        }
    }

    /// Body of a `do` block or `def`, up to and including `end`. Inline
    /// `rescue` / `ensure` clauses wrap the body in a `Begin`.
    pub(super) fn parse_body_until_end(&mut self) -> Result<Vec<Node>, ScriptError> {
        let line = self.cur_line();
        let clauses = self.parse_clauses()?;
        if clauses.rescues.is_empty() && clauses.else_body.is_none() && clauses.ensure.is_none() {
            return Ok(clauses.body);
        }
        Ok(vec![Node::new(
            NodeKind::Begin {
                body: clauses.body,
                rescues: clauses.rescues,
                else_body: clauses.else_body,
                ensure: clauses.ensure,
            },
            line,
        )])
    }

    fn parse_clauses(&mut self) -> Result<Clauses, ScriptError> {
        let body = self.parse_statements(BODY_CLAUSES)?;
        let mut rescues = Vec::new();
        while self.eat_word("rescue") {
            rescues.push(self.parse_rescue_clause()?);
        }
        let else_body = if self.eat_word("else") {
            Some(self.parse_statements(&["ensure", "end"])?)
        } else {
            None
        };
        let ensure = if self.eat_word("ensure") {
            Some(self.parse_statements(&["end"])?)
        } else {
            None
        };
        self.expect_word("end")?;
        Ok(Clauses {
            body,
            rescues,
            else_body,
            ensure,
        })
    }

    /// `rescue A, B => e` header and body; `rescue` has been consumed.
    fn parse_rescue_clause(&mut self) -> Result<Rescue, ScriptError> {
        let mut classes = Vec::new();
        while !matches!(
            self.peek(),
            Token::Newline | Token::Semi | Token::Arrow | Token::Eof
        ) && !self.is_word("then")
        {
            classes.push(self.parse_ternary()?);
            if !self.eat(&Token::Comma) {
                break;
            }
            self.skip_newlines();
        }
        let var = if self.eat(&Token::Arrow) {
            let line = self.cur_line();
            let kind = match self.advance().token.clone() {
                Token::Word(w) => {
                    self.declare(&w);
                    NodeKind::LVar(w)
                }
                Token::IVar(n) => NodeKind::IVar(n),
                Token::GVar(n) => NodeKind::GVar(n),
                other => {
                    return Err(self.err(format!("expected rescue variable, got {:?}", other)))
                }
            };
            Some(Box::new(Node::new(kind, line)))
        } else {
            None
        };
        self.eat_word("then");
        let body = self.parse_statements(BODY_CLAUSES)?;
        Ok(Rescue { classes, var, body })
    }

    /// Condition followed by `then`, a newline or `;`.
    fn parse_condition(&mut self) -> Result<Node, ScriptError> {
        let cond = self.parse_expr_statement()?;
        self.skip_terms();
        self.eat_word("then");
        Ok(cond)
    }

    // -- Conditionals -------------------------------------------

    fn parse_if(&mut self, line: u32) -> Result<Node, ScriptError> {
        let cond = self.parse_condition()?;
        let then_body = self.parse_statements(&["elsif", "else", "end"])?;
        let else_body = self.parse_if_tail()?;
        Ok(Node::new(
            NodeKind::If {
                cond: Box::new(cond),
                then_body,
                else_body,
            },
            line,
        ))
    }

    /// `elsif` / `else` / `end` after an `if` body. `elsif` nests another
    /// `If` as the sole statement of the else branch.
    fn parse_if_tail(&mut self) -> Result<Option<Vec<Node>>, ScriptError> {
        let line = self.cur_line();
        if self.eat_word("elsif") {
            let cond = self.parse_condition()?;
            let then_body = self.parse_statements(&["elsif", "else", "end"])?;
            let else_body = self.parse_if_tail()?;
            return Ok(Some(vec![Node::new(
                NodeKind::If {
                    cond: Box::new(cond),
                    then_body,
                    else_body,
                },
                line,
            )]));
        }
        if self.eat_word("else") {
            let body = self.parse_statements(&["end"])?;
            self.expect_word("end")?;
            return Ok(Some(body));
        }
        self.expect_word("end")?;
        Ok(None)
    }

    fn parse_unless(&mut self, line: u32) -> Result<Node, ScriptError> {
        let cond = self.parse_condition()?;
        let body = self.parse_statements(&["else", "end"])?;
        let else_body = if self.eat_word("else") {
            Some(self.parse_statements(&["end"])?)
        } else {
            None
        };
        self.expect_word("end")?;
        Ok(Node::new(
            NodeKind::Unless {
                cond: Box::new(cond),
                body,
                else_body,
            },
            line,
        ))
    }

    fn parse_case(&mut self, line: u32) -> Result<Node, ScriptError> {
        let subject = if matches!(self.peek(), Token::Newline | Token::Semi) {
            None
        } else {
            Some(Box::new(self.parse_expr_statement()?))
        };
        self.skip_terms();
        let mut whens = Vec::new();
        while self.eat_word("when") {
            let mut conds = vec![self.parse_call_arg()?];
            while self.eat(&Token::Comma) {
                self.skip_newlines();
                conds.push(self.parse_call_arg()?);
            }
            self.skip_terms();
            self.eat_word("then");
            let body = self.parse_statements(&["when", "else", "end"])?;
            whens.push(When { conds, body });
        }
        if whens.is_empty() {
            return Err(self.err(format!("expected 'when', got {:?}", self.peek())));
        }
        let else_body = if self.eat_word("else") {
            Some(self.parse_statements(&["end"])?)
        } else {
            None
        };
        self.expect_word("end")?;
        Ok(Node::new(
            NodeKind::Case {
                subject,
                whens,
                else_body,
            },
            line,
        ))
    }

    // -- Loops --------------------------------------------------

    /// Loop header: `do` here belongs to the loop.
    fn parse_loop_header(&mut self) -> Result<Node, ScriptError> {
        let cond = self.without_do(|p| p.parse_expr_statement())?;
        self.eat_word("do");
        self.skip_terms();
        Ok(cond)
    }

    fn parse_while(&mut self, line: u32, until: bool) -> Result<Node, ScriptError> {
        let cond = self.parse_loop_header()?;
        let body = self.parse_statements(&["end"])?;
        self.expect_word("end")?;
        Ok(Node::new(
            NodeKind::While {
                cond: Box::new(cond),
                body,
                until,
            },
            line,
        ))
    }

    fn parse_for(&mut self, line: u32) -> Result<Node, ScriptError> {
        let var_line = self.cur_line();
        let name = self.take_word()?;
        self.declare(&name);
        self.expect_word("in")?;
        let iter = self.parse_loop_header()?;
        let body = self.parse_statements(&["end"])?;
        self.expect_word("end")?;
        Ok(Node::new(
            NodeKind::For {
                var: Box::new(Node::new(NodeKind::LVar(name), var_line)),
                iter: Box::new(iter),
                body,
            },
            line,
        ))
    }

    // -- Definitions --------------------------------------------

    fn parse_def(&mut self, line: u32) -> Result<Node, ScriptError> {
        // `def self.name` / `def Const.name`
        let dotted = self.peek_at(1) == &Token::Dot;
        let singleton = match self.peek().clone() {
            Token::Word(w) if dotted && w == "self" => {
                self.advance();
                self.advance();
                Some(Box::new(Node::new(NodeKind::SelfRef, line)))
            }
            Token::Const(c) if dotted => {
                self.advance();
                self.advance();
                Some(Box::new(Node::new(
                    NodeKind::Const {
                        scope: None,
                        name: c,
                    },
                    line,
                )))
            }
            _ => None,
        };
        let mut name = match self.advance().token.clone() {
            Token::Word(w) | Token::Const(w) => w,
            Token::Op(op) => op,
            other => return Err(self.err(format!("expected method name, got {:?}", other))),
        };
        // setter: `def value=(v)`
        if self.is_op("=") && !self.cur().space_before && self.peek_at(1) == &Token::LParen {
            self.advance();
            name.push('=');
        }
        let (params, body) = self.with_scope(Scope::hard(), |p| {
            let params = if p.peek() == &Token::LParen {
                p.advance();
                let params = p.parse_param_list(|p| p.peek() == &Token::RParen)?;
                p.expect(Token::RParen, ")")?;
                params
            } else if matches!(p.peek(), Token::Newline | Token::Semi | Token::Eof) {
                Vec::new()
            } else {
                p.parse_param_list(|p| matches!(p.peek(), Token::Newline | Token::Semi))?
            };
            let body = p.parse_body_until_end()?;
            Ok((params, body))
        })?;
        Ok(Node::new(
            NodeKind::Def {
                singleton,
                name,
                params,
                body,
            },
            line,
        ))
    }

    /// `Name` or `Outer::Name` after `class` / `module`.
    fn parse_const_path(&mut self) -> Result<Node, ScriptError> {
        let line = self.cur_line();
        let mut path = match self.advance().token.clone() {
            Token::Const(name) => Node::new(NodeKind::Const { scope: None, name }, line),
            other => return Err(self.err(format!("expected constant name, got {:?}", other))),
        };
        while self.peek() == &Token::ColonColon {
            self.advance();
            let name = match self.advance().token.clone() {
                Token::Const(name) => name,
                other => return Err(self.err(format!("expected constant name, got {:?}", other))),
            };
            path = Node::new(
                NodeKind::Const {
                    scope: Some(Box::new(path)),
                    name,
                },
                line,
            );
        }
        Ok(path)
    }

    fn parse_class(&mut self, line: u32) -> Result<Node, ScriptError> {
        let path = self.parse_const_path()?;
        let superclass = if self.eat_op("<") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let body = self.with_scope(Scope::hard(), |p| p.parse_body_until_end())?;
        Ok(Node::new(
            NodeKind::Class {
                path: Box::new(path),
                superclass,
                body,
            },
            line,
        ))
    }

    fn parse_module(&mut self, line: u32) -> Result<Node, ScriptError> {
        let path = self.parse_const_path()?;
        let body = self.with_scope(Scope::hard(), |p| p.parse_body_until_end())?;
        Ok(Node::new(
            NodeKind::Module {
                path: Box::new(path),
                body,
            },
            line,
        ))
    }
}
