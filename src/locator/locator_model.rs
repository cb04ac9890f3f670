use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LocatorSyntaxError;

use super::parser::parse_locator;

/// A parsed path expression selecting elements of the document form.
///
/// Supported subset: absolute and relative paths, `/`, `//`, `.`, `..`,
/// `*`, name tests, `|` unions, and predicates built from `@attr`,
/// `text()`, `.`, string/number literals, `position()`, `last()`,
/// `contains()`, `starts-with()`, `normalize-space()`, `not()`,
/// comparisons, `and`/`or`, positional `[n]` and nested relative paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    raw: String,
    paths: Vec<LocationPath>,
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, LocatorSyntaxError> {
        let paths = parse_locator(raw)?;
        Ok(Locator {
            raw: raw.to_string(),
            paths,
        })
    }

    /// Locator selecting the node with the given tag and document id.
    pub fn for_node(tag: &str, id: usize) -> Self {
        Locator {
            raw: format!("//{}[@id='{}']", tag, id),
            paths: vec![LocationPath {
                absolute: true,
                steps: vec![
                    Step::descendant_or_self(),
                    Step {
                        axis: Axis::Child,
                        test: NodeTest::Name(tag.to_string()),
                        predicates: vec![Expr::Compare {
                            op: CmpOp::Eq,
                            left: Operand::Attr("id".into()),
                            right: Operand::Literal(id.to_string()),
                        }],
                    },
                ],
            }],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn paths(&self) -> &[LocationPath] {
        &self.paths
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Locator {
    type Error = LocatorSyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Locator::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(value: Locator) -> Self {
        value.raw
    }
}

/// Join a locator list for logs and error messages.
pub fn describe_locators(locators: &[Locator]) -> String {
    locators
        .iter()
        .map(Locator::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    DescendantOrSelf,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(String),
    /// `*`: any element
    Wildcard,
    /// `node()`: any node including the document node
    AnyNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        op: CmpOp,
        left: Operand,
        right: Operand,
    },
    Contains(Operand, Operand),
    StartsWith(Operand, Operand),
    /// Bare operand: true when it yields anything
    Exists(Operand),
    /// `[n]`
    Position(usize),
    /// `[last()]`
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Attr(String),
    Text,
    Context,
    Literal(String),
    Number(f64),
    Position,
    Last,
    NormalizeSpace(Option<Box<Operand>>),
    Path(LocationPath),
}
