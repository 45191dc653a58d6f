//! Generic syntax tree for Fastfile scripts.
//!
//! The parser produces these nodes for the Ruby subset that build scripts
//! use. The tree builder only interprets a handful of call shapes; every
//! other node is handed to the renderer and kept as source text.

// ──────────────────────────────────────────────
// Nodes
// ──────────────────────────────────────────────

/// A syntax tree node with the line it starts on.
///
/// Equality ignores `line`: two trees are equal when they have the same
/// shape and the same literal contents, which is what "re-parses to an
/// equivalent tree" means for rendered fallback code.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Node {
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Node { kind, line }
    }

    /// Method name when this node is a receiverless call (`foo`, `foo(1)`,
    /// `foo 1, bar: 2`).
    pub fn bare_call_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Call {
                recv: None, name, ..
            } => Some(name),
            _ => None,
        }
    }

    /// True for nodes that are plain literal values.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Nil
                | NodeKind::True
                | NodeKind::False
                | NodeKind::Int(_)
                | NodeKind::BigInt(_)
                | NodeKind::Float(_)
                | NodeKind::Str(_)
                | NodeKind::Sym(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Literals
    Nil,
    True,
    False,
    SelfRef,
    Int(i64),
    /// Integer literal outside the `i64` range, digits as written
    BigInt(String),
    Float(f64),
    Str(String),
    /// String with `#{}` interpolation
    DStr(Vec<Segment>),
    /// Backtick command string
    XStr(Vec<Segment>),
    Sym(String),
    Regex {
        source: String,
        flags: String,
    },
    Array(Vec<Node>),
    /// `braced` is false for trailing keyword arguments of a call.
    Hash {
        pairs: Vec<Node>,
        braced: bool,
    },
    Pair {
        key: Box<Node>,
        value: Box<Node>,
    },
    Range {
        lo: Option<Box<Node>>,
        hi: Option<Box<Node>>,
        exclusive: bool,
    },
    Splat(Box<Node>),
    DoubleSplat(Box<Node>),
    /// `&blk` / `&:sym` argument; `None` for anonymous `&`
    BlockPass(Option<Box<Node>>),

    // Variables and constants
    LVar(String),
    IVar(String),
    CVar(String),
    GVar(String),
    /// `Name` or `Scope::Name`; a `None` scope with a leading `::` is not
    /// distinguished.
    Const {
        scope: Option<Box<Node>>,
        name: String,
    },

    // Calls
    Call {
        recv: Option<Box<Node>>,
        name: String,
        args: Vec<Node>,
        safe_nav: bool,
    },
    Index {
        recv: Box<Node>,
        args: Vec<Node>,
    },
    /// A call with an attached `do ... end` / `{ ... }` block.
    Block {
        call: Box<Node>,
        params: Vec<Param>,
        body: Vec<Node>,
    },
    Lambda {
        params: Vec<Param>,
        body: Vec<Node>,
    },
    Yield(Vec<Node>),
    Super(Option<Vec<Node>>),

    // Assignment
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    /// `a += 1`, `a ||= b`; `op` excludes the trailing `=`.
    OpAssign {
        target: Box<Node>,
        op: String,
        value: Box<Node>,
    },
    MultiAssign {
        targets: Vec<Node>,
        value: Box<Node>,
    },

    // Operators
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Binary {
        op: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: String,
        operand: Box<Node>,
    },
    Defined(Box<Node>),
    /// Parenthesized statement sequence with more than one statement.
    Paren(Vec<Node>),

    // Control flow
    If {
        cond: Box<Node>,
        then_body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
    Unless {
        cond: Box<Node>,
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
    Ternary {
        cond: Box<Node>,
        then_value: Box<Node>,
        else_value: Box<Node>,
    },
    While {
        cond: Box<Node>,
        body: Vec<Node>,
        until: bool,
    },
    For {
        var: Box<Node>,
        iter: Box<Node>,
        body: Vec<Node>,
    },
    Case {
        subject: Option<Box<Node>>,
        whens: Vec<When>,
        else_body: Option<Vec<Node>>,
    },
    Begin {
        body: Vec<Node>,
        rescues: Vec<Rescue>,
        else_body: Option<Vec<Node>>,
        ensure: Option<Vec<Node>>,
    },
    Return(Option<Box<Node>>),
    Next(Option<Box<Node>>),
    Break(Option<Box<Node>>),
    Redo,
    Retry,

    // Definitions
    Def {
        singleton: Option<Box<Node>>,
        name: String,
        params: Vec<Param>,
        body: Vec<Node>,
    },
    Class {
        path: Box<Node>,
        superclass: Option<Box<Node>>,
        body: Vec<Node>,
    },
    Module {
        path: Box<Node>,
        body: Vec<Node>,
    },
}

// ──────────────────────────────────────────────
// Auxiliary structures
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Lit(String),
    Code(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct When {
    pub conds: Vec<Node>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rescue {
    pub classes: Vec<Node>,
    pub var: Option<Box<Node>>,
    pub body: Vec<Node>,
}

/// Method, block and lambda parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Req(String),
    Opt(String, Node),
    Rest(Option<String>),
    Key(String),
    KeyOpt(String, Node),
    KeyRest(Option<String>),
    Block(String),
    /// `|(a, b), c|`
    Destructure(Vec<Param>),
}

impl Param {
    pub fn name(&self) -> Option<&str> {
        match self {
            Param::Req(n)
            | Param::Opt(n, _)
            | Param::Key(n)
            | Param::KeyOpt(n, _)
            | Param::Block(n) => Some(n),
            Param::Rest(n) | Param::KeyRest(n) => n.as_deref(),
            Param::Destructure(_) => None,
        }
    }
}
