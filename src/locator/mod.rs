pub mod eval;
pub mod locator_model;
pub mod parser;

pub use eval::evaluate;
pub use locator_model::{Locator, describe_locators};
