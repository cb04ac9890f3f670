pub mod classify;
pub mod element_model;
pub mod normalize;
