//! Renders syntax trees back to Ruby source.
//!
//! Used for every statement the tree builder does not recognize. The text
//! is normalized rather than verbatim: two-space indentation, parenthesized
//! call arguments, parenthesized binary operations and double-quoted
//! strings. Re-parsing the output yields an equivalent tree.

use crate::ast::{Node, NodeKind, Param, Rescue, Segment, When};

/// Turns a subtree into source text for an advanced-code entry.
pub trait Render {
    fn render(&self, node: &Node) -> String;
}

/// The default renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RubyRenderer;

impl Render for RubyRenderer {
    fn render(&self, node: &Node) -> String {
        let mut out = Writer::default();
        out.node(node);
        out.finish()
    }
}

/// Render a whole statement list, one statement per line.
pub fn render_body(body: &[Node]) -> String {
    let mut out = Writer::default();
    out.statements(body);
    out.finish()
}

/// Render statements on one line, separated by `; `.
pub(crate) fn render_inline(body: &[Node]) -> String {
    let mut out = Writer::default();
    out.inline(body);
    out.finish()
}

#[derive(Default)]
struct Writer {
    buf: String,
    indent: usize,
}

impl Writer {
    fn finish(self) -> String {
        self.buf
    }

    fn push(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.buf.push('\n');
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
    }

    /// Statements separated by newlines at the current indentation.
    fn statements(&mut self, body: &[Node]) {
        for (i, stmt) in body.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.node(stmt);
        }
    }

    /// An indented body followed by a newline at the outer level.
    fn block_body(&mut self, body: &[Node]) {
        if !body.is_empty() {
            self.indent += 1;
            self.newline();
            self.statements(body);
            self.indent -= 1;
        }
        self.newline();
    }

    fn inline(&mut self, body: &[Node]) {
        for (i, stmt) in body.iter().enumerate() {
            if i > 0 {
                self.push("; ");
            }
            self.node(stmt);
        }
    }

    fn list(&mut self, items: &[Node]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.node(item);
        }
    }

    fn node(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Nil => self.push("nil"),
            NodeKind::True => self.push("true"),
            NodeKind::False => self.push("false"),
            NodeKind::SelfRef => self.push("self"),
            NodeKind::Int(n) => self.push(&n.to_string()),
            NodeKind::BigInt(digits) => self.push(digits),
            NodeKind::Float(f) => self.push(&format_float(*f)),
            NodeKind::Str(s) => {
                self.push("\"");
                self.push(&escape(s, '"'));
                self.push("\"");
            }
            NodeKind::DStr(segments) => self.interpolated(segments, '"'),
            NodeKind::XStr(segments) => self.interpolated(segments, '`'),
            NodeKind::Sym(s) => self.push(&symbol(s)),
            NodeKind::Regex { source, flags } => {
                self.push("/");
                self.push(source);
                self.push("/");
                self.push(flags);
            }
            NodeKind::Array(items) => {
                self.push("[");
                self.list(items);
                self.push("]");
            }
            NodeKind::Hash { pairs, braced } => {
                if !braced {
                    self.list(pairs);
                } else if pairs.is_empty() {
                    self.push("{}");
                } else {
                    self.push("{ ");
                    self.list(pairs);
                    self.push(" }");
                }
            }
            NodeKind::Pair { key, value } => {
                match &key.kind {
                    NodeKind::Sym(s) if is_identifier(s) => {
                        self.push(s);
                        self.push(": ");
                    }
                    _ => {
                        self.node(key);
                        self.push(" => ");
                    }
                }
                self.node(value);
            }
            NodeKind::Range { lo, hi, exclusive } => {
                self.push("(");
                if let Some(lo) = lo {
                    self.node(lo);
                }
                self.push(if *exclusive { "..." } else { ".." });
                if let Some(hi) = hi {
                    self.node(hi);
                }
                self.push(")");
            }
            NodeKind::Splat(inner) => {
                self.push("*");
                self.node(inner);
            }
            NodeKind::DoubleSplat(inner) => {
                self.push("**");
                self.node(inner);
            }
            NodeKind::BlockPass(inner) => {
                self.push("&");
                if let Some(inner) = inner {
                    self.node(inner);
                }
            }
            NodeKind::LVar(name)
            | NodeKind::IVar(name)
            | NodeKind::CVar(name)
            | NodeKind::GVar(name) => self.push(name),
            NodeKind::Const { scope, name } => {
                if let Some(scope) = scope {
                    self.node(scope);
                    self.push("::");
                }
                self.push(name);
            }
            NodeKind::Call {
                recv,
                name,
                args,
                safe_nav,
            } => {
                if let Some(recv) = recv {
                    self.receiver(recv);
                    self.push(if *safe_nav { "&." } else { "." });
                }
                self.push(name);
                if !args.is_empty() {
                    self.push("(");
                    self.list(args);
                    self.push(")");
                }
            }
            NodeKind::Index { recv, args } => {
                self.receiver(recv);
                self.push("[");
                self.list(args);
                self.push("]");
            }
            NodeKind::Block { call, params, body } => {
                self.node(call);
                self.push(" do");
                self.params_in_pipes(params);
                self.block_body(body);
                self.push("end");
            }
            NodeKind::Lambda { params, body } => {
                self.push("->");
                if !params.is_empty() {
                    self.push("(");
                    self.params(params);
                    self.push(")");
                }
                self.push(" do");
                self.block_body(body);
                self.push("end");
            }
            NodeKind::Yield(args) => {
                self.keyword_call("yield", Some(args).filter(|args| !args.is_empty()))
            }
            NodeKind::Super(args) => self.keyword_call("super", args.as_ref()),
            NodeKind::Assign { target, value } => {
                self.node(target);
                self.push(" = ");
                self.node(value);
            }
            NodeKind::OpAssign { target, op, value } => {
                self.node(target);
                self.push(" ");
                self.push(op);
                self.push("= ");
                self.node(value);
            }
            NodeKind::MultiAssign { targets, value } => {
                self.list(targets);
                self.push(" = ");
                self.node(value);
            }
            NodeKind::And(lhs, rhs) => self.binary("&&", lhs, rhs),
            NodeKind::Or(lhs, rhs) => self.binary("||", lhs, rhs),
            NodeKind::Binary { op, lhs, rhs } => self.binary(op, lhs, rhs),
            NodeKind::Not(operand) => {
                self.push("!");
                self.operand(operand);
            }
            NodeKind::Unary { op, operand } => {
                self.push(op);
                self.operand(operand);
            }
            NodeKind::Defined(operand) => {
                self.push("defined?(");
                self.node(operand);
                self.push(")");
            }
            NodeKind::Paren(body) => {
                self.push("(");
                self.inline(body);
                self.push(")");
            }
            NodeKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.push("if ");
                self.node(cond);
                self.block_body(then_body);
                self.if_tail(else_body.as_deref());
            }
            NodeKind::Unless {
                cond,
                body,
                else_body,
            } => {
                self.push("unless ");
                self.node(cond);
                self.block_body(body);
                if let Some(else_body) = else_body {
                    self.push("else");
                    self.block_body(else_body);
                }
                self.push("end");
            }
            NodeKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.push("(");
                self.node(cond);
                self.push(" ? ");
                self.node(then_value);
                self.push(" : ");
                self.node(else_value);
                self.push(")");
            }
            NodeKind::While { cond, body, until } => {
                self.push(if *until { "until " } else { "while " });
                self.node(cond);
                self.block_body(body);
                self.push("end");
            }
            NodeKind::For { var, iter, body } => {
                self.push("for ");
                self.node(var);
                self.push(" in ");
                self.node(iter);
                self.block_body(body);
                self.push("end");
            }
            NodeKind::Case {
                subject,
                whens,
                else_body,
            } => {
                self.push("case");
                if let Some(subject) = subject {
                    self.push(" ");
                    self.node(subject);
                }
                self.newline();
                for When { conds, body } in whens {
                    self.push("when ");
                    self.list(conds);
                    self.block_body(body);
                }
                if let Some(else_body) = else_body {
                    self.push("else");
                    self.block_body(else_body);
                }
                self.push("end");
            }
            NodeKind::Begin {
                body,
                rescues,
                else_body,
                ensure,
            } => {
                self.push("begin");
                self.block_body(body);
                for rescue in rescues {
                    self.rescue(rescue);
                }
                if let Some(else_body) = else_body {
                    self.push("else");
                    self.block_body(else_body);
                }
                if let Some(ensure) = ensure {
                    self.push("ensure");
                    self.block_body(ensure);
                }
                self.push("end");
            }
            NodeKind::Return(value) => self.jump("return", value.as_deref()),
            NodeKind::Next(value) => self.jump("next", value.as_deref()),
            NodeKind::Break(value) => self.jump("break", value.as_deref()),
            NodeKind::Redo => self.push("redo"),
            NodeKind::Retry => self.push("retry"),
            NodeKind::Def {
                singleton,
                name,
                params,
                body,
            } => {
                self.push("def ");
                if let Some(singleton) = singleton {
                    self.node(singleton);
                    self.push(".");
                }
                self.push(name);
                if !params.is_empty() {
                    self.push("(");
                    self.params(params);
                    self.push(")");
                }
                self.block_body(body);
                self.push("end");
            }
            NodeKind::Class {
                path,
                superclass,
                body,
            } => {
                self.push("class ");
                self.node(path);
                if let Some(superclass) = superclass {
                    self.push(" < ");
                    self.node(superclass);
                }
                self.block_body(body);
                self.push("end");
            }
            NodeKind::Module { path, body } => {
                self.push("module ");
                self.node(path);
                self.block_body(body);
                self.push("end");
            }
        }
    }

    /// Receivers that would bind differently without parentheses.
    fn receiver(&mut self, recv: &Node) {
        let needs_parens = matches!(
            recv.kind,
            NodeKind::Int(n) if n < 0
        ) || matches!(recv.kind, NodeKind::Float(f) if f < 0.0)
            || matches!(
                recv.kind,
                NodeKind::Not(_)
                    | NodeKind::Unary { .. }
                    | NodeKind::Assign { .. }
                    | NodeKind::OpAssign { .. }
                    | NodeKind::If { .. }
                    | NodeKind::Unless { .. }
                    | NodeKind::While { .. }
                    | NodeKind::Case { .. }
                    | NodeKind::Defined(_)
                    | NodeKind::Lambda { .. }
                    | NodeKind::Block { .. }
            );
        if needs_parens {
            self.push("(");
            self.node(recv);
            self.push(")");
        } else {
            self.node(recv);
        }
    }

    /// Operand of a prefix operator.
    fn operand(&mut self, operand: &Node) {
        let wrap = matches!(
            operand.kind,
            NodeKind::Assign { .. }
                | NodeKind::OpAssign { .. }
                | NodeKind::MultiAssign { .. }
                | NodeKind::If { .. }
                | NodeKind::Unless { .. }
                | NodeKind::While { .. }
                | NodeKind::Case { .. }
                | NodeKind::Block { .. }
                | NodeKind::Int(_)
                | NodeKind::Float(_)
        );
        if wrap {
            self.push("(");
            self.node(operand);
            self.push(")");
        } else {
            self.node(operand);
        }
    }

    fn binary(&mut self, op: &str, lhs: &Node, rhs: &Node) {
        self.push("(");
        // `-2 ** 2` is `-(2 ** 2)`, so a negative base keeps its parens.
        if op == "**" {
            self.receiver(lhs);
        } else {
            self.node(lhs);
        }
        self.push(" ");
        self.push(op);
        self.push(" ");
        self.node(rhs);
        self.push(")");
    }

    fn keyword_call(&mut self, keyword: &str, args: Option<&Vec<Node>>) {
        self.push(keyword);
        if let Some(args) = args {
            self.push("(");
            self.list(args);
            self.push(")");
        }
    }

    fn jump(&mut self, keyword: &str, value: Option<&Node>) {
        self.push(keyword);
        if let Some(value) = value {
            self.push(" ");
            self.node(value);
        }
    }

    fn if_tail(&mut self, else_body: Option<&[Node]>) {
        match else_body {
            None => self.push("end"),
            Some([nested]) if matches!(nested.kind, NodeKind::If { .. }) => {
                if let NodeKind::If {
                    cond,
                    then_body,
                    else_body,
                } = &nested.kind
                {
                    self.push("elsif ");
                    self.node(cond);
                    self.block_body(then_body);
                    self.if_tail(else_body.as_deref());
                }
            }
            Some(body) => {
                self.push("else");
                self.block_body(body);
                self.push("end");
            }
        }
    }

    fn rescue(&mut self, rescue: &Rescue) {
        self.push("rescue");
        if !rescue.classes.is_empty() {
            self.push(" ");
            self.list(&rescue.classes);
        }
        if let Some(var) = &rescue.var {
            self.push(" => ");
            self.node(var);
        }
        self.block_body(&rescue.body);
    }

    fn params_in_pipes(&mut self, params: &[Param]) {
        if params.is_empty() {
            return;
        }
        self.push(" |");
        self.params(params);
        self.push("|");
    }

    fn params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match param {
                Param::Req(name) => self.push(name),
                Param::Opt(name, default) => {
                    self.push(name);
                    self.push(" = ");
                    self.node(default);
                }
                Param::Rest(name) => {
                    self.push("*");
                    self.push(name.as_deref().unwrap_or(""));
                }
                Param::Key(name) => {
                    self.push(name);
                    self.push(":");
                }
                Param::KeyOpt(name, default) => {
                    self.push(name);
                    self.push(": ");
                    self.node(default);
                }
                Param::KeyRest(name) => {
                    self.push("**");
                    self.push(name.as_deref().unwrap_or(""));
                }
                Param::Block(name) => {
                    self.push("&");
                    self.push(name);
                }
                Param::Destructure(inner) => {
                    self.push("(");
                    self.params(inner);
                    self.push(")");
                }
            }
        }
    }

    fn interpolated(&mut self, segments: &[Segment], quote: char) {
        self.buf.push(quote);
        for segment in segments {
            match segment {
                Segment::Lit(s) => self.push(&escape(s, quote)),
                Segment::Code(body) => {
                    self.push("#{");
                    self.inline(body);
                    self.push("}");
                }
            }
        }
        self.buf.push(quote);
    }
}

/// Floats always carry a decimal point so they re-lex as floats.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Escape for a double-quoted (or backtick) literal.
fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0b}' => out.push_str("\\v"),
            '\u{0c}' => out.push_str("\\f"),
            '#' if matches!(chars.peek(), Some('{') | Some('@') | Some('$')) => {
                out.push_str("\\#")
            }
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let first_ok = chars
        .next()
        .map_or(false, |c| c.is_alphabetic() || c == '_');
    let body = s.trim_end_matches(['?', '!']);
    first_ok
        && body.chars().all(|c| c.is_alphanumeric() || c == '_')
        && s.len() - body.len() <= 1
}

fn symbol(s: &str) -> String {
    let setter = s
        .strip_suffix('=')
        .map_or(false, |base| is_identifier(base) && !base.ends_with(['?', '!']));
    if is_identifier(s) || setter {
        format!(":{}", s)
    } else {
        format!(":\"{}\"", escape(s, '"'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn program(src: &str) -> Vec<Node> {
        let tokens = lex(src, "Fastfile").expect("lex");
        parse(&tokens, "Fastfile").expect("parse")
    }

    fn render_src(src: &str) -> String {
        render_body(&program(src))
    }

    /// Render, re-parse, and compare trees.
    fn assert_round_trips(src: &str) {
        let tree = program(src);
        let rendered = render_body(&tree);
        let reparsed = program(&rendered);
        assert_eq!(tree, reparsed, "rendered:\n{}", rendered);
    }

    #[test]
    fn renders_loop_call_with_block() {
        assert_eq!(
            render_src("10.times do\n    yolo\nend\n"),
            "10.times do\n  yolo\nend"
        );
    }

    #[test]
    fn renders_nested_control_flow_normalized() {
        let src = "if 10 + 10 == 100\n  while something\n    puts 'hi'\n  end\nend\n";
        assert_eq!(
            render_src(src),
            "if ((10 + 10) == 100)\n  while something\n    puts(\"hi\")\n  end\nend"
        );
    }

    #[test]
    fn renders_receiver_calls_with_parenthesized_args() {
        assert_eq!(
            render_src("UI.message \"Hello\", key: 1\n"),
            "UI.message(\"Hello\", key: 1)"
        );
    }

    #[test]
    fn renders_hashes_and_symbols() {
        assert_eq!(
            render_src("x = { \"a\" => :b, c: :\"d e\" }\n"),
            "x = { \"a\" => :b, c: :\"d e\" }"
        );
    }

    #[test]
    fn renders_if_elsif_else() {
        let src = "if a\n  one\nelsif b\n  two\nelse\n  three\nend\n";
        assert_eq!(render_src(src), src.trim_end());
    }

    #[test]
    fn escapes_strings() {
        let src = "puts 'say \"hi\" #{not interpolated}\\n'\n";
        assert_eq!(
            render_src(src),
            "puts(\"say \\\"hi\\\" \\#{not interpolated}\\\\n\")"
        );
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(25.12), "25.12");
    }

    #[test]
    fn rendered_code_round_trips() {
        assert_round_trips("10.times do\n  yolo\nend\n");
        assert_round_trips("if 10 + 10 == 100\n  while something\n    puts 'hi'\n  end\nend\n");
        assert_round_trips("version = get_version_number(xcodeproj: \"App.xcodeproj\")\nputs \"v#{version}\"\n");
        assert_round_trips("begin\n  risky\nrescue => e\n  UI.error e.message\nend\n");
        assert_round_trips("case ENV[\"LANE\"]\nwhen \"a\", \"b\"\n  one\nelse\n  two\nend\n");
        assert_round_trips("x = flag ? -1 : !ready && other\n");
        assert_round_trips("items.map { |i| i * 2 }.each do |v|\n  puts v\nend\n");
        assert_round_trips("def helper(a, b = 1, *rest, key:, &blk)\n  a + b\nend\n");
        assert_round_trips("sh(\"ls\") unless File.exist?(path)\n");
        assert_round_trips("x = -(a + b) ** 2\nfoo(*args, **opts, &blk)\n");
    }

    #[test]
    fn empty_defs_round_trip() {
        assert_round_trips("def foo\nend\n");
        assert_round_trips("def foo; end\n");
        assert_round_trips("module A\n class B < C\n def self.d; end\n end\nend\n");
        assert_eq!(render_src("def foo; end\n"), "def foo\nend");
    }

    #[test]
    fn block_params_round_trip() {
        assert_round_trips("hash.each { |(k, v), c| p k }\n");
        assert_round_trips("list.map { |a = 1| a }\n");
    }

    #[test]
    fn pow_with_negative_base_round_trips() {
        assert_round_trips("x = -2 ** 2\n");
        assert_round_trips("y = (-2) ** 2\n");
        assert_eq!(render_src("y = (-2) ** 2\n"), "y = ((-2) ** 2)");
    }

    #[test]
    fn numeric_and_escaped_literals_round_trip() {
        assert_round_trips("x = 20240101123456789012\ny = 0b101 + 0o17\n");
        assert_round_trips("slack(message: \"caf\\u00e9 \\u{1F680} \\a\\b\\v\\f\\0 \\x01\")\n");
        assert_eq!(
            render_src("puts \"\\a\\0\\x01\"\n"),
            "puts(\"\\a\\u0000\\u0001\")"
        );
    }

    #[test]
    fn custom_renderer_through_trait_object() {
        struct Fixed;
        impl Render for Fixed {
            fn render(&self, _node: &Node) -> String {
                "<code>".into()
            }
        }
        let r: &dyn Render = &Fixed;
        assert_eq!(r.render(&program("foo\n")[0]), "<code>");
        assert_eq!(RubyRenderer.render(&program("foo\n")[0]), "foo");
    }
}
