//! Decoding of action call arguments.
//!
//! Only the first argument counts. Keyword arguments (or a braced hash)
//! become a flat [`Value::Map`]; anything else becomes a single scalar.
//! Nothing is evaluated: compound expressions are reduced to their last
//! literal-looking child, which is what a reader of the script would
//! recognize as "the value".

use indexmap::IndexMap;

use crate::ast::{Node, NodeKind, Segment};
use crate::document::Value;
use crate::unparse::render_inline;

/// Decode a call's argument list.
pub fn normalize(args: &[Node]) -> Value {
    let Some(first) = args.first() else {
        return Value::Absent;
    };
    match &first.kind {
        NodeKind::Hash { pairs, .. } => Value::Map(decode_pairs(pairs)),
        _ => decode_value(first),
    }
}

fn decode_pairs(pairs: &[Node]) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    for pair in pairs {
        let (key, value) = match &pair.kind {
            NodeKind::Pair { key, value } => (key, value),
            other => {
                log::debug!(
                    "line {}: skipping non-pair keyword argument {:?}",
                    pair.line,
                    other
                );
                continue;
            }
        };
        let key = match &key.kind {
            NodeKind::Sym(s) | NodeKind::Str(s) => s.clone(),
            other => {
                log::debug!(
                    "line {}: skipping parameter with non-literal key {:?}",
                    pair.line,
                    other
                );
                continue;
            }
        };
        map.insert(key, decode_value(value));
    }
    map
}

/// Literal values decode directly; anything else is reduced shallowly.
fn decode_value(node: &Node) -> Value {
    match &node.kind {
        NodeKind::Nil => Value::Absent,
        NodeKind::True => Value::Bool(true),
        NodeKind::False => Value::Bool(false),
        NodeKind::Int(n) => Value::Int(*n),
        NodeKind::BigInt(digits) => Value::Str(digits.clone()),
        NodeKind::Float(f) => Value::Float(*f),
        NodeKind::Str(s) => Value::Str(s.clone()),
        NodeKind::Sym(s) => Value::Symbol(s.clone()),
        _ => {
            let value = shallow(node);
            log::debug!(
                "line {}: non-literal parameter decoded shallowly as {:?}",
                node.line,
                value
            );
            value
        }
    }
}

/// The most literal sub-value of a compound expression: the name of a
/// variable or argument-less call, the last argument or element of a
/// call, index or array, or the right-hand side of an operator. Never a
/// mapping.
fn shallow(node: &Node) -> Value {
    match &node.kind {
        NodeKind::DStr(segments) => Value::Str(interpolated_text(segments)),
        NodeKind::Call { name, args, .. } if args.is_empty() => Value::Symbol(name.clone()),
        NodeKind::Call { args, .. } | NodeKind::Index { args, .. } | NodeKind::Array(args) => {
            args.last().map_or(Value::Absent, decode_value)
        }
        NodeKind::LVar(name)
        | NodeKind::IVar(name)
        | NodeKind::CVar(name)
        | NodeKind::GVar(name)
        | NodeKind::Const { name, .. } => Value::Symbol(name.clone()),
        NodeKind::Hash { pairs, .. } => pairs.last().map_or(Value::Absent, decode_value),
        NodeKind::Pair { value, .. } => decode_value(value),
        NodeKind::Binary { rhs: last, .. }
        | NodeKind::And(_, last)
        | NodeKind::Or(_, last)
        | NodeKind::Ternary {
            else_value: last, ..
        }
        | NodeKind::Unary { operand: last, .. }
        | NodeKind::Not(last)
        | NodeKind::Splat(last)
        | NodeKind::Block { call: last, .. } => decode_value(last),
        NodeKind::Range { hi: Some(last), .. } => decode_value(last),
        _ => Value::Absent,
    }
}

/// Interpolated strings keep their `#{...}` source.
fn interpolated_text(segments: &[Segment]) -> String {
    let mut text = String::new();
    for segment in segments {
        match segment {
            Segment::Lit(s) => text.push_str(s),
            Segment::Code(body) => {
                text.push_str("#{");
                text.push_str(&render_inline(body));
                text.push('}');
            }
        }
    }
    text
}
