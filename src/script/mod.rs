pub mod compiler;
pub mod context;
pub mod runner;
pub mod script_model;

pub use compiler::{compile, parse_selector};
pub use runner::ScriptRunner;
pub use script_model::{RunResult, Script, ScriptStep, SourceLocation, StepOp, StepValue};
