use std::collections::BTreeSet;

use crate::markup::{DocIndex, Document};

use super::locator_model::{Axis, CmpOp, Expr, LocationPath, Locator, NodeTest, Operand, Step};

/// Evaluate a locator against a document.
///
/// Returns matched elements in document order without duplicates.
/// Absolute paths start at the document node, relative paths at the
/// root element.
pub fn evaluate(doc: &Document, locator: &Locator) -> Vec<DocIndex> {
    let mut matched = BTreeSet::new();
    for path in locator.paths() {
        let start = if path.absolute {
            Some(Document::DOCUMENT)
        } else {
            doc.root_element()
        };
        if let Some(start) = start {
            matched.extend(eval_path(doc, path, start));
        }
    }
    matched.into_iter().filter(|&i| !doc.is_document(i)).collect()
}

fn eval_path(doc: &Document, path: &LocationPath, context: DocIndex) -> BTreeSet<DocIndex> {
    let mut current: BTreeSet<DocIndex> = BTreeSet::from([if path.absolute {
        Document::DOCUMENT
    } else {
        context
    }]);

    for step in &path.steps {
        let mut next = BTreeSet::new();
        for &node in &current {
            next.extend(eval_step(doc, step, node));
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn eval_step(doc: &Document, step: &Step, context: DocIndex) -> Vec<DocIndex> {
    let axis_nodes: Vec<DocIndex> = match step.axis {
        Axis::Child => doc.node(context).children.clone(),
        Axis::DescendantOrSelf => {
            let mut nodes = vec![context];
            nodes.extend(doc.descendants(context));
            nodes
        }
        Axis::SelfNode => vec![context],
        Axis::Parent => doc.node(context).parent.into_iter().collect(),
    };

    let mut candidates: Vec<DocIndex> = axis_nodes
        .into_iter()
        .filter(|&i| node_test(doc, &step.test, i))
        .collect();

    for predicate in &step.predicates {
        let size = candidates.len();
        candidates = candidates
            .into_iter()
            .enumerate()
            .filter(|&(pos, node)| {
                let ctx = Context {
                    node,
                    position: pos + 1,
                    size,
                };
                eval_expr(doc, predicate, &ctx)
            })
            .map(|(_, node)| node)
            .collect();
    }
    candidates
}

fn node_test(doc: &Document, test: &NodeTest, idx: DocIndex) -> bool {
    match test {
        NodeTest::AnyNode => true,
        NodeTest::Wildcard => !doc.is_document(idx),
        NodeTest::Name(name) => !doc.is_document(idx) && doc.node(idx).tag == *name,
    }
}

struct Context {
    node: DocIndex,
    position: usize,
    size: usize,
}

/// Intermediate predicate value. Node-sets are carried as their string
/// values since only those are observable from a predicate.
#[derive(Debug, Clone)]
enum Value {
    Set(Vec<String>),
    Str(String),
    Num(f64),
}

impl Value {
    fn to_str(&self) -> String {
        match self {
            Value::Set(items) => items.first().cloned().unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
        }
    }

    fn to_num(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            other => parse_number(&other.to_str()),
        }
    }

    fn to_bool(&self) -> bool {
        match self {
            Value::Set(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn eval_operand(doc: &Document, operand: &Operand, ctx: &Context) -> Value {
    match operand {
        Operand::Attr(name) => Value::Set(doc.attr(ctx.node, name).map(str::to_string).into_iter().collect()),
        Operand::Text => Value::Set(doc.node(ctx.node).text.clone().into_iter().collect()),
        Operand::Context => Value::Set(vec![doc.string_value(ctx.node)]),
        Operand::Literal(s) => Value::Str(s.clone()),
        Operand::Number(n) => Value::Num(*n),
        Operand::Position => Value::Num(ctx.position as f64),
        Operand::Last => Value::Num(ctx.size as f64),
        Operand::NormalizeSpace(None) => Value::Str(normalize_space(&doc.string_value(ctx.node))),
        Operand::NormalizeSpace(Some(inner)) => {
            Value::Str(normalize_space(&eval_operand(doc, inner, ctx).to_str()))
        }
        Operand::Path(path) => Value::Set(
            eval_path(doc, path, ctx.node)
                .into_iter()
                .map(|i| doc.string_value(i))
                .collect(),
        ),
    }
}

fn eval_expr(doc: &Document, expr: &Expr, ctx: &Context) -> bool {
    match expr {
        Expr::Or(a, b) => eval_expr(doc, a, ctx) || eval_expr(doc, b, ctx),
        Expr::And(a, b) => eval_expr(doc, a, ctx) && eval_expr(doc, b, ctx),
        Expr::Not(inner) => !eval_expr(doc, inner, ctx),
        Expr::Compare { op, left, right } => {
            let l = eval_operand(doc, left, ctx);
            let r = eval_operand(doc, right, ctx);
            compare(*op, &l, &r)
        }
        Expr::Contains(a, b) => {
            let haystack = eval_operand(doc, a, ctx).to_str();
            haystack.contains(&eval_operand(doc, b, ctx).to_str())
        }
        Expr::StartsWith(a, b) => {
            let haystack = eval_operand(doc, a, ctx).to_str();
            haystack.starts_with(&eval_operand(doc, b, ctx).to_str())
        }
        Expr::Exists(operand) => match eval_operand(doc, operand, ctx) {
            Value::Num(n) => ctx.position as f64 == n,
            other => other.to_bool(),
        },
        Expr::Position(n) => ctx.position == *n,
        Expr::Last => ctx.position == ctx.size,
    }
}

/// Comparison with node-set existential semantics.
fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Set(ls), Value::Set(rs)) => ls
            .iter()
            .any(|l| rs.iter().any(|r| compare_atoms(op, &Value::Str(l.clone()), &Value::Str(r.clone())))),
        (Value::Set(ls), other) => ls
            .iter()
            .any(|l| compare_atoms(op, &Value::Str(l.clone()), other)),
        (other, Value::Set(rs)) => rs
            .iter()
            .any(|r| compare_atoms(op, other, &Value::Str(r.clone()))),
        (l, r) => compare_atoms(op, l, r),
    }
}

fn compare_atoms(op: CmpOp, left: &Value, right: &Value) -> bool {
    let numeric = matches!(left, Value::Num(_)) || matches!(right, Value::Num(_));
    match op {
        CmpOp::Eq | CmpOp::Ne => {
            let equal = if numeric {
                left.to_num() == right.to_num()
            } else {
                left.to_str() == right.to_str()
            };
            (op == CmpOp::Eq) == equal
        }
        CmpOp::Lt => left.to_num() < right.to_num(),
        CmpOp::Le => left.to_num() <= right.to_num(),
        CmpOp::Gt => left.to_num() > right.to_num(),
        CmpOp::Ge => left.to_num() >= right.to_num(),
    }
}
