pub mod query;
pub mod tree_model;

pub use query::ElementAttributes;
pub use tree_model::{ElementTree, Node};
