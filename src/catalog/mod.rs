pub mod catalog_model;
pub mod dependency;

pub use catalog_model::{ApiEle, Catalog, Screen, describe_elements};
pub use dependency::{DependentAction, DependentKind, Direction, screen_of};
