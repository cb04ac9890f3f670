pub mod markup_model;
pub mod parser;

pub use markup_model::{DocIndex, DocNode, Document};
pub use parser::{MarkupError, parse};
