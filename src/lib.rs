//! Executes UI automation scripts against a device by resolving
//! documented element references on the observed element tree, scrolling
//! and replaying declared navigation paths when a target is not visible.

pub mod catalog;
pub mod cli;
pub mod element;
pub mod engine;
pub mod env;
pub mod error;
pub mod group;
pub mod locator;
pub mod markup;
pub mod report;
pub mod script;
pub mod skeleton;
pub mod trace;
pub mod tree;
