use std::collections::HashMap;

use crate::group::ElementList;

use super::script_model::{SourceLocation, StepOutput, StepValue};

/// Tracks loop bindings and collected outputs of a running script.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Steps started so far, loop bodies included
    pub steps_run: usize,

    /// Values produced by read steps, in execution order
    pub outputs: Vec<StepOutput>,

    bindings: HashMap<String, ElementList>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: &SourceLocation, value: StepValue) {
        self.outputs.push(StepOutput {
            source: source.clone(),
            value,
        });
    }

    pub fn binding(&self, var: &str) -> Option<&ElementList> {
        self.bindings.get(var)
    }

    /// Bind `var`, returning the handle it shadowed.
    pub fn bind(&mut self, var: &str, list: ElementList) -> Option<ElementList> {
        self.bindings.insert(var.to_string(), list)
    }

    /// Drop the binding of `var`, restoring a shadowed one.
    pub fn unbind(&mut self, var: &str, previous: Option<ElementList>) {
        match previous {
            Some(list) => {
                self.bindings.insert(var.to_string(), list);
            }
            None => {
                self.bindings.remove(var);
            }
        }
    }
}
