use tracing::{debug, info, warn};

use crate::engine::{ActionKind, ActionOutcome, ActionRequest, Verifier};
use crate::env::Environment;
use crate::error::VerifyError;
use crate::group::ElementList;

use super::context::RunContext;
use super::script_model::{
    Access, RunFailure, RunResult, Script, ScriptStep, SourceLocation, StepOp, StepValue,
    TargetBase, TargetRef,
};

/// Executes a compiled script step by step against a verifier.
pub struct ScriptRunner;

impl ScriptRunner {
    /// Run a complete script.
    ///
    /// Never panics and never propagates: the first failing step ends the
    /// run and is reported in the returned result.
    pub fn run<E: Environment>(script: &Script, verifier: &mut Verifier<E>) -> RunResult {
        let mut ctx = RunContext::new();
        info!(script = %script.name, steps = script.step_count(), "running script");

        let outcome = match verifier.start() {
            Ok(()) => Self::run_steps(&script.steps, verifier, &mut ctx),
            Err(e) => Err((e, None)),
        };
        verifier.finish();

        let error = outcome.err().map(|(err, source)| {
            warn!(script = %script.name, error = %err, "script failed");
            RunFailure {
                kind: err.kind().to_string(),
                message: err.to_string(),
                location: err.location().cloned().or(source),
            }
        });

        RunResult {
            script: script.name.clone(),
            passed: error.is_none(),
            steps_run: ctx.steps_run,
            actions: verifier.action_count(),
            outputs: ctx.outputs,
            error,
            duration_ms: verifier.session().elapsed_ms(),
        }
    }

    fn run_steps<E: Environment>(
        steps: &[ScriptStep],
        verifier: &mut Verifier<E>,
        ctx: &mut RunContext,
    ) -> Result<(), (VerifyError, Option<SourceLocation>)> {
        for step in steps {
            ctx.steps_run += 1;
            match &step.op {
                StepOp::For { var, target, body } => {
                    let mut list = Self::materialize(target, &step.source, verifier, ctx)
                        .map_err(|e| (e, Some(step.source.clone())))?;
                    let mut iterations = 0;
                    loop {
                        let item = list
                            .next(verifier, Some(&step.source))
                            .map_err(|e| (e, Some(step.source.clone())))?;
                        let Some(item) = item else {
                            break;
                        };
                        iterations += 1;
                        let previous = ctx.bind(var, item);
                        let result = Self::run_steps(body, verifier, ctx);
                        ctx.unbind(var, previous);
                        result?;
                    }
                    debug!(var = %var, iterations, "loop finished");
                }
                _ => Self::execute_step(step, verifier, ctx)
                    .map_err(|e| (e, Some(step.source.clone())))?,
            }
        }
        Ok(())
    }

    /// Execute a single non-loop step.
    fn execute_step<E: Environment>(
        step: &ScriptStep,
        verifier: &mut Verifier<E>,
        ctx: &mut RunContext,
    ) -> Result<(), VerifyError> {
        let source = &step.source;
        let (kind, target) = match &step.op {
            StepOp::Back => {
                verifier.execute(&ActionRequest::back().with_source(Some(source.clone())))?;
                return Ok(());
            }
            StepOp::Len { target } => {
                let list = Self::materialize(target, source, verifier, ctx)?;
                let count = list.len(verifier, Some(source))?;
                ctx.record(source, StepValue::Count(count));
                return Ok(());
            }
            StepOp::Tap { target } => (ActionKind::Tap, target),
            StepOp::LongTap { target } => (ActionKind::LongTap, target),
            StepOp::SetText { target, .. } => (ActionKind::SetText, target),
            StepOp::Scroll { target, .. } => (ActionKind::Scroll, target),
            StepOp::GetText { target } => (ActionKind::GetText, target),
            StepOp::GetAttributes { target } => (ActionKind::GetAttributes, target),
            StepOp::For { .. } => return Ok(()),
        };

        let list = Self::materialize(target, source, verifier, ctx)?;
        let mut request =
            ActionRequest::new(kind, list.target().clone()).with_source(Some(source.clone()));
        match &step.op {
            StepOp::SetText { text, .. } => request = request.with_text(text),
            StepOp::Scroll { direction, .. } => request = request.with_direction(*direction),
            _ => {}
        }

        match verifier.execute(&request)? {
            ActionOutcome::Done => {}
            ActionOutcome::Text(text) => ctx.record(source, StepValue::Text(text)),
            ActionOutcome::Attributes(attrs) => ctx.record(source, StepValue::Attributes(attrs)),
            ActionOutcome::AtEnd(at_end) => ctx.record(source, StepValue::AtEnd(at_end)),
        }
        Ok(())
    }

    /// Turn a selector into a group handle, applying index or match.
    fn materialize<E: Environment>(
        target: &TargetRef,
        source: &SourceLocation,
        verifier: &mut Verifier<E>,
        ctx: &RunContext,
    ) -> Result<ElementList, VerifyError> {
        let base = match &target.base {
            TargetBase::Api(name) => ElementList::from_api(name),
            TargetBase::Var(var) => match ctx.binding(var) {
                Some(list) => list.clone(),
                None => {
                    verifier.record_step_failure("resolve", Some(var), Some(source));
                    return Err(VerifyError::Action {
                        action: "resolve".into(),
                        target: var.clone(),
                        reason: "variable is not bound".into(),
                        location: Some(source.clone()),
                    });
                }
            },
        };

        match &target.access {
            None => Ok(base),
            Some(Access::Index(n)) => match base.index(verifier, *n, Some(source))? {
                Some(child) => Ok(child),
                None => {
                    verifier.record_step_failure("index", Some(base.name()), Some(source));
                    Err(VerifyError::Action {
                        action: "index".into(),
                        target: base.name().to_string(),
                        reason: format!("no child at position {}", n),
                        location: Some(source.clone()),
                    })
                }
            },
            Some(Access::Match(query)) => base.find_match(verifier, query, Some(source)),
        }
    }
}
