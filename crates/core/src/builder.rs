//! Builds a [`Document`] from a parsed Fastfile.
//!
//! The walker recognizes `platform`, `lane`, `private_lane`, `before_all`,
//! `after_all`, `error`, `desc` and receiverless calls. Every other node is
//! rendered back to source and kept as an advanced-code entry in the lane
//! it appears in.

use crate::ast::{Node, NodeKind};
use crate::document::{ActionEntry, Document, LaneKey, Value};
use crate::params::normalize;
use crate::unparse::{Render, RubyRenderer};

static DEFAULT_RENDERER: RubyRenderer = RubyRenderer;

/// A local `import "path"` call seen during the walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub path: String,
    pub line: u32,
}

/// Where actions land: the enclosing platform and lane. Passed down the
/// recursion by reference; leaving a block drops back to the caller's.
#[derive(Debug, Clone, Default)]
struct Scope {
    platform: Option<String>,
    lane: Option<LaneKey>,
}

impl Scope {
    fn with_platform(&self, platform: String) -> Scope {
        Scope {
            platform: Some(platform),
            lane: self.lane.clone(),
        }
    }

    fn with_lane(&self, lane: LaneKey) -> Scope {
        Scope {
            platform: self.platform.clone(),
            lane: Some(lane),
        }
    }
}

/// One traversal, one document. [`TreeBuilder::build`] consumes the
/// builder.
pub struct TreeBuilder<'r> {
    renderer: &'r dyn Render,
    document: Document,
    /// `desc` texts waiting for the next lane
    pending_description: Vec<String>,
    imports: Vec<ImportRequest>,
}

impl Default for TreeBuilder<'static> {
    fn default() -> Self {
        TreeBuilder::new()
    }
}

impl TreeBuilder<'static> {
    pub fn new() -> Self {
        TreeBuilder::with_renderer(&DEFAULT_RENDERER)
    }
}

impl<'r> TreeBuilder<'r> {
    /// Use a custom renderer for advanced-code entries.
    pub fn with_renderer(renderer: &'r dyn Render) -> Self {
        TreeBuilder {
            renderer,
            document: Document::new(),
            pending_description: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn build(self, program: &[Node]) -> Document {
        self.build_with_imports(program).0
    }

    /// Build, also returning the `import` calls found, in source order.
    pub fn build_with_imports(mut self, program: &[Node]) -> (Document, Vec<ImportRequest>) {
        self.visit_body(program, &Scope::default());
        if !self.pending_description.is_empty() {
            log::debug!(
                "dropping {} description(s) not followed by a lane",
                self.pending_description.len()
            );
        }
        (self.document, self.imports)
    }

    fn visit_body(&mut self, body: &[Node], scope: &Scope) {
        for node in body {
            self.visit(node, scope);
        }
    }

    fn visit(&mut self, node: &Node, scope: &Scope) {
        match &node.kind {
            NodeKind::Call {
                recv: None,
                name,
                args,
                ..
            } => self.visit_call(node, name, args, scope),
            NodeKind::Block { call, body, .. } => match &call.kind {
                NodeKind::Call {
                    recv: None,
                    name,
                    args,
                    ..
                } => self.visit_block(node, name, args, body, scope),
                _ => self.opaque(node, scope),
            },
            _ => self.opaque(node, scope),
        }
    }

    fn visit_block(
        &mut self,
        node: &Node,
        name: &str,
        args: &[Node],
        body: &[Node],
        scope: &Scope,
    ) {
        match name {
            "before_all" => self.visit_body(body, &scope.with_lane(LaneKey::BeforeAll)),
            "after_all" => self.visit_body(body, &scope.with_lane(LaneKey::AfterAll)),
            "error" => self.visit_body(body, &scope.with_lane(LaneKey::Error)),
            "lane" | "private_lane" => match identifier(args) {
                Some(lane) => {
                    let private = name == "private_lane";
                    self.visit_lane(lane, private, body, scope);
                }
                None => self.opaque(node, scope),
            },
            "platform" => match identifier(args) {
                Some(platform) => {
                    log::trace!("line {}: entering platform '{}'", node.line, platform);
                    self.visit_body(body, &scope.with_platform(platform));
                }
                None => self.opaque(node, scope),
            },
            _ => self.opaque(node, scope),
        }
    }

    fn visit_lane(&mut self, lane: String, private: bool, body: &[Node], scope: &Scope) {
        log::trace!(
            "entering {}lane '{}'",
            if private { "private " } else { "" },
            lane
        );
        let inner = scope.with_lane(LaneKey::Named(lane));
        let description = std::mem::take(&mut self.pending_description);
        let entry = self
            .document
            .entry_mut(inner.platform.as_deref(), inner.lane.as_ref());
        entry.description = description;
        entry.private = Some(private);
        self.visit_body(body, &inner);
    }

    fn visit_call(&mut self, node: &Node, name: &str, args: &[Node], scope: &Scope) {
        let parameters = normalize(args);
        if name == "desc" {
            match parameters {
                Value::Absent => log::debug!("line {}: empty desc ignored", node.line),
                Value::Str(text) => self.pending_description.push(text),
                other => self.pending_description.push(other.to_string()),
            }
            return;
        }
        if name == "import" {
            if let Value::Str(path) = &parameters {
                self.imports.push(ImportRequest {
                    path: path.clone(),
                    line: node.line,
                });
            }
        }
        self.push_action(
            scope,
            ActionEntry::Call {
                name: name.to_owned(),
                parameters,
            },
        );
    }

    fn opaque(&mut self, node: &Node, scope: &Scope) {
        let source_text = self.renderer.render(node);
        log::debug!(
            "line {}: keeping unrecognized statement as advanced code",
            node.line
        );
        self.push_action(scope, ActionEntry::Opaque { source_text });
    }

    fn push_action(&mut self, scope: &Scope, action: ActionEntry) {
        self.document
            .entry_mut(scope.platform.as_deref(), scope.lane.as_ref())
            .actions
            .push(action);
    }
}

/// Lane or platform name from the first argument (`:beta`, `"beta"`).
fn identifier(args: &[Node]) -> Option<String> {
    match normalize(args) {
        Value::Symbol(s) | Value::Str(s) => Some(s),
        _ => None,
    }
}
