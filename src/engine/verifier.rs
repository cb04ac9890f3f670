use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, DependentAction, Direction, describe_elements};
use crate::env::{EnvAction, Environment};
use crate::error::VerifyError;
use crate::locator::{Locator, describe_locators};
use crate::script::script_model::SourceLocation;
use crate::trace::{EffectScope, ExecutionRecord, RecordKind, TraceLogger};
use crate::tree::{ElementTree, Node};

use super::budget::{BudgetDecision, ReplayBudget, check_action_budget};
use super::convert::{convert_action, dependent_request};
use super::engine_model::{ActionKind, ActionOutcome, ActionRequest, ElementRef, EngineConfig};
use super::session::SessionState;

/// The resolution engine.
///
/// Turns a structured request into device actions: direct lookup, then
/// scroll search, then dependency replay, then a terminal outcome. Owns
/// the session cache; nothing else observes or acts on the device.
pub struct Verifier<E: Environment> {
    env: E,
    catalog: Catalog,
    config: EngineConfig,
    session: SessionState,
    logger: TraceLogger,
}

/// A target resolved to its locators.
struct Resolved {
    api: Option<String>,
    name: String,
    locators: Vec<Locator>,
}

impl Resolved {
    fn locator_text(&self) -> String {
        describe_locators(&self.locators)
    }
}

/// Result of one dependency step during replay.
#[derive(Debug, PartialEq, Eq)]
enum StepOutcome {
    Executed,
    /// Not applicable here; try the next step
    Skipped,
    /// The step's element could not be reached
    Missing,
}

impl<E: Environment> Verifier<E> {
    pub fn new(env: E, catalog: Catalog, config: EngineConfig, logger: TraceLogger) -> Self {
        let catalog = catalog.with_default_screen(config.default_screen.clone());
        let session = SessionState::new(config.settle_delay_ms);
        Verifier {
            env,
            catalog,
            config,
            session,
            logger,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &TraceLogger {
        &self.logger
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn action_count(&self) -> usize {
        self.session.action_count()
    }

    /// Reset the session and take a first observation.
    pub fn start(&mut self) -> Result<(), VerifyError> {
        self.session.reset();
        self.session.start();
        self.session.refresh(&mut self.env)?;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.session.finish();
    }

    /// Reset the app to its home screen and start over with a fresh
    /// observation and action count.
    pub fn reset(&mut self) -> Result<(), VerifyError> {
        self.env.reset(true)?;
        self.session.reset();
        self.session.refresh(&mut self.env)?;
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<bool, VerifyError> {
        Ok(self.session.refresh(&mut self.env)?)
    }

    /// Current tree, observing first if nothing is cached.
    pub fn current_tree(&mut self) -> Result<&ElementTree, VerifyError> {
        Ok(self.session.ensure(&mut self.env)?)
    }

    /// Catalog screen currently shown, falling back to the default screen.
    pub fn current_screen(&mut self) -> Result<Option<String>, VerifyError> {
        let skeleton = self.session.ensure(&mut self.env)?.skeleton();
        Ok(self
            .catalog
            .resolve_screen(&skeleton)
            .or(self.catalog.default_screen())
            .map(str::to_string))
    }

    /// Description of the documented elements present right now.
    pub fn describe_current_elements(&mut self, with_locators: bool) -> Result<String, VerifyError> {
        let Some(screen) = self.current_screen()? else {
            return Ok(String::new());
        };
        let tree = self.session.ensure(&mut self.env)?;
        let present = self.catalog.present_elements(&screen, tree);
        Ok(describe_elements(&present, with_locators))
    }

    /// Run one requested primitive action.
    pub fn execute(&mut self, request: &ActionRequest) -> Result<ActionOutcome, VerifyError> {
        self.count_request(request)?;
        info!(
            action = %request.kind,
            element = request.target_name(),
            count = self.session.action_count(),
            "requested action"
        );

        if request.kind == ActionKind::Back {
            let at_end = self.back(request.source.as_ref())?;
            debug!(at_end, "went back");
            return Ok(ActionOutcome::Done);
        }

        let Some(target) = request.target.as_ref() else {
            self.record_failure(request, None, "");
            return Err(VerifyError::Action {
                action: request.kind.to_string(),
                target: String::new(),
                reason: "no target element".into(),
                location: request.source.clone(),
            });
        };

        let node = self.navigate_and_get_target(target, request)?;
        self.act_on(&node, request, EffectScope::Global)
    }

    pub fn tap(&mut self, api: &str, source: Option<SourceLocation>) -> Result<(), VerifyError> {
        self.execute(&ActionRequest::tap(api).with_source(source)).map(|_| ())
    }

    pub fn long_tap(&mut self, api: &str, source: Option<SourceLocation>) -> Result<(), VerifyError> {
        self.execute(&ActionRequest::long_tap(api).with_source(source))
            .map(|_| ())
    }

    pub fn set_text(
        &mut self,
        api: &str,
        text: &str,
        source: Option<SourceLocation>,
    ) -> Result<(), VerifyError> {
        self.execute(&ActionRequest::set_text(api, text).with_source(source))
            .map(|_| ())
    }

    /// Scroll a container. Returns whether it was already at its end.
    pub fn scroll(
        &mut self,
        api: &str,
        direction: Direction,
        source: Option<SourceLocation>,
    ) -> Result<bool, VerifyError> {
        match self.execute(&ActionRequest::scroll(api, direction).with_source(source))? {
            ActionOutcome::AtEnd(at_end) => Ok(at_end),
            _ => Ok(false),
        }
    }

    pub fn get_text(
        &mut self,
        api: &str,
        source: Option<SourceLocation>,
    ) -> Result<Option<String>, VerifyError> {
        match self.execute(&ActionRequest::get_text(api).with_source(source))? {
            ActionOutcome::Text(text) => Ok(text),
            _ => Ok(None),
        }
    }

    pub fn get_attributes(
        &mut self,
        api: &str,
        source: Option<SourceLocation>,
    ) -> Result<Option<crate::tree::ElementAttributes>, VerifyError> {
        match self.execute(&ActionRequest::get_attributes(api).with_source(source))? {
            ActionOutcome::Attributes(attrs) => Ok(Some(attrs)),
            _ => Ok(None),
        }
    }

    /// Navigate back. Reopens the app when the result is no cataloged
    /// screen and an app name is configured. Returns whether the screen
    /// stayed the same.
    pub fn back(&mut self, source: Option<&SourceLocation>) -> Result<bool, VerifyError> {
        self.log(
            ExecutionRecord::now(RecordKind::Action, self.session.markup())
                .with_action("back")
                .with_skeleton(self.skeleton_text())
                .with_source(source),
        );
        let changed = match self
            .session
            .perform(&mut self.env, None, &EnvAction::NavigateBack)
        {
            Ok(changed) => changed,
            Err(e) => {
                self.record_step_failure("back", None, source);
                return Err(e.into());
            }
        };

        let skeleton = self.session.ensure(&mut self.env)?.skeleton();
        if self.catalog.resolve_screen(&skeleton).is_none() {
            if let Some(app_name) = self.config.app_name.clone() {
                info!(app = %app_name, "left the app, reopening");
                self.log(
                    ExecutionRecord::now(RecordKind::Navigate, self.session.markup())
                        .with_action("open_app")
                        .with_input(Some(&app_name))
                        .with_skeleton(self.skeleton_text())
                        .with_source(source),
                );
                if let Err(e) = self
                    .session
                    .perform(&mut self.env, None, &EnvAction::OpenApp { app_name })
                {
                    self.record_step_failure("open_app", None, source);
                    return Err(e.into());
                }
            }
        }
        Ok(!changed)
    }

    /// Count a request against the action budget.
    pub(crate) fn count_request(&mut self, request: &ActionRequest) -> Result<(), VerifyError> {
        let count = self.session.count_request();
        match check_action_budget(count, &self.config) {
            BudgetDecision::Allow => Ok(()),
            BudgetDecision::Warn => {
                warn!(
                    count,
                    cap = self.config.max_action_count,
                    "action count over the configured cap"
                );
                Ok(())
            }
            BudgetDecision::Block => {
                self.record_failure(request, None, "");
                Err(VerifyError::BudgetExhausted {
                    count,
                    cap: self.config.max_action_count,
                    location: request.source.clone(),
                })
            }
        }
    }

    fn resolve_ref(&self, target: &ElementRef, request: &ActionRequest) -> Result<Resolved, VerifyError> {
        match target {
            ElementRef::Api(name) => {
                let Some(api) = self.catalog.get_api(name) else {
                    self.record_failure(request, Some(name), "");
                    return Err(VerifyError::Doc {
                        name: name.clone(),
                        location: request.source.clone(),
                    });
                };
                Ok(Resolved {
                    api: Some(name.clone()),
                    name: name.clone(),
                    locators: api.locators.clone(),
                })
            }
            ElementRef::Located { name, locator } => Ok(Resolved {
                api: None,
                name: name.clone(),
                locators: vec![locator.clone()],
            }),
        }
    }

    /// Find the target element, scrolling and replaying dependency paths
    /// as needed. Failures are logged before they are returned.
    pub fn navigate_and_get_target(
        &mut self,
        target: &ElementRef,
        request: &ActionRequest,
    ) -> Result<Node, VerifyError> {
        let resolved = self.resolve_ref(target, request)?;
        if resolved.locators.is_empty() {
            self.record_failure(request, resolved.api.as_deref(), "");
            return Err(VerifyError::Locator {
                name: resolved.name,
                locator: String::new(),
                location: request.source.clone(),
            });
        }
        let locator_text = resolved.locator_text();
        self.session.ensure(&mut self.env)?;
        let source = request.source.as_ref();

        let mut found = self.locate(&resolved.locators);
        if let Some(node) = found.take() {
            debug!(element = %resolved.name, id = node.id, "direct lookup hit");
            found = if request.kind == ActionKind::SetText {
                self.keyboard_guard(node, &resolved.locators, source)?
            } else {
                Some(node)
            };
        }

        if found.is_none() {
            found = self.scroll_search(&resolved.locators, source, None)?;
        }

        if found.is_none() {
            if let Some(api) = &resolved.api {
                let skeleton = self.session.ensure(&mut self.env)?.skeleton();
                if self.catalog.api_on_current_screen(api, &skeleton) {
                    self.record_failure(request, Some(api), &locator_text);
                    return Err(VerifyError::Locator {
                        name: resolved.name.clone(),
                        locator: locator_text,
                        location: request.source.clone(),
                    });
                }
                found = self.replay(api, &resolved.locators, source)?;
            }
        }

        match found {
            Some(node) => Ok(node),
            None => {
                self.record_failure(request, resolved.api.as_deref(), &locator_text);
                Err(VerifyError::NotFound {
                    name: resolved.name,
                    locator: locator_text,
                    group: None,
                    location: request.source.clone(),
                })
            }
        }
    }

    /// Perform the requested action on an element of the current tree.
    pub fn act_on(
        &mut self,
        node: &Node,
        request: &ActionRequest,
        effect: EffectScope,
    ) -> Result<ActionOutcome, VerifyError> {
        let api = match &request.target {
            Some(ElementRef::Api(name)) => Some(name.as_str()),
            _ => None,
        };
        let locator = match &request.target {
            Some(ElementRef::Located { locator, .. }) => locator.to_string(),
            Some(ElementRef::Api(name)) => self
                .catalog
                .get_api(name)
                .map(|a| describe_locators(&a.locators))
                .unwrap_or_default(),
            None => String::new(),
        };
        let record = ExecutionRecord::now(RecordKind::Action, self.session.markup())
            .with_target(Some(node.id))
            .with_action(request.kind)
            .with_input(request.text.as_deref())
            .with_api(api)
            .with_locator(&locator)
            .with_skeleton(self.skeleton_text())
            .with_source(request.source.as_ref())
            .with_effect(effect);

        match request.kind {
            ActionKind::GetText => {
                self.log(record);
                let text = self
                    .session
                    .tree()
                    .and_then(|t| t.get_text(node.id))
                    .map(|t| t.replace("--", " "));
                Ok(ActionOutcome::Text(text))
            }
            ActionKind::GetAttributes => {
                self.log(record);
                let attrs = self
                    .session
                    .tree()
                    .and_then(|t| t.get_attributes(node.id))
                    .map(|mut a| {
                        a.text = a.text.map(|t| t.replace("--", " "));
                        a
                    });
                match attrs {
                    Some(a) => Ok(ActionOutcome::Attributes(a)),
                    None => Err(self.action_error(request, node, "element vanished", &locator)),
                }
            }
            ActionKind::Back => {
                self.back(request.source.as_ref())?;
                Ok(ActionOutcome::Done)
            }
            kind => {
                let env_action = convert_action(kind, node, request.text.as_deref(), request.direction)
                    .map_err(|reason| self.action_error(request, node, &reason, &locator))?;
                self.log(record);
                let changed = match self.session.perform(&mut self.env, Some(node), &env_action) {
                    Ok(changed) => changed,
                    Err(e) => {
                        self.record_failure(request, api, &locator);
                        return Err(e.into());
                    }
                };
                if kind == ActionKind::Scroll {
                    Ok(ActionOutcome::AtEnd(!changed))
                } else {
                    Ok(ActionOutcome::Done)
                }
            }
        }
    }

    fn action_error(&self, request: &ActionRequest, node: &Node, reason: &str, locator: &str) -> VerifyError {
        let api = match &request.target {
            Some(ElementRef::Api(name)) => Some(name.as_str()),
            _ => None,
        };
        self.log(
            ExecutionRecord::now(RecordKind::Failed, self.session.markup())
                .with_target(Some(node.id))
                .with_action(request.kind)
                .with_input(request.text.as_deref())
                .with_api(api)
                .with_locator(locator)
                .with_source(request.source.as_ref()),
        );
        VerifyError::Action {
            action: request.kind.to_string(),
            target: request.target_name().to_string(),
            reason: reason.to_string(),
            location: request.source.clone(),
        }
    }

    /// First node in the cached tree matching any of `locators`.
    pub fn locate(&self, locators: &[Locator]) -> Option<Node> {
        self.session.tree()?.get_by_locators(locators).cloned()
    }

    /// Scroll `set_text` targets near the bottom edge into view.
    fn keyboard_guard(
        &mut self,
        node: Node,
        locators: &[Locator],
        source: Option<&SourceLocation>,
    ) -> Result<Option<Node>, VerifyError> {
        let Some(bbox) = node.element.bbox_pixels else {
            return Ok(Some(node));
        };
        let (_, height) = self.env.logical_screen_size();
        if bbox.center().1 < self.config.keyboard_margin * height as f64 {
            return Ok(Some(node));
        }

        let action = match convert_action(ActionKind::Scroll, &node, None, Some(Direction::Down)) {
            Ok(action) => action,
            Err(reason) => {
                debug!(id = node.id, reason = %reason, "cannot scroll the input into view");
                return Ok(Some(node));
            }
        };
        debug!(id = node.id, "input near the bottom edge, scrolling it into view");
        self.log(
            ExecutionRecord::now(RecordKind::Navigate, self.session.markup())
                .with_target(Some(node.id))
                .with_action("scroll down")
                .with_skeleton(self.skeleton_text())
                .with_source(source),
        );
        self.session.perform(&mut self.env, Some(&node), &action)?;
        Ok(self.locate(locators))
    }

    /// Scroll every scrollable container looking for `locators`.
    ///
    /// A container is abandoned once a scroll on it reveals no element
    /// description unseen so far, or leaves the screen unchanged. Every
    /// container gets at least one scroll. When `budget` is set every
    /// scroll is charged to it.
    fn scroll_search(
        &mut self,
        locators: &[Locator],
        source: Option<&SourceLocation>,
        mut budget: Option<&mut ReplayBudget>,
    ) -> Result<Option<Node>, VerifyError> {
        let (containers, mut seen): (Vec<Node>, HashSet<String>) = {
            let tree = self.session.ensure(&mut self.env)?;
            let containers = tree
                .scrollable_ids()
                .iter()
                .filter_map(|id| tree.node(*id).cloned())
                .collect();
            (containers, tree.descriptions_without_text().into_iter().collect())
        };
        let direction = self.config.scroll_search_direction;
        let locator_text = describe_locators(locators);

        for container in &containers {
            for attempt in 0..self.config.max_scroll_count {
                let tree = self.session.ensure(&mut self.env)?;
                if let Some(node) = tree.get_by_locators(locators) {
                    return Ok(Some(node.clone()));
                }
                let Some(target) = tree.find_by_properties(container).cloned() else {
                    debug!(container = container.id, "scroll container disappeared");
                    break;
                };
                let action = match convert_action(ActionKind::Scroll, &target, None, Some(direction)) {
                    Ok(action) => action,
                    Err(reason) => {
                        debug!(container = container.id, reason = %reason, "cannot scroll container");
                        break;
                    }
                };

                if let Some(b) = budget.as_deref_mut() {
                    if !b.spend() {
                        return Ok(self.locate(locators));
                    }
                }

                self.log(
                    ExecutionRecord::now(RecordKind::Navigate, self.session.markup())
                        .with_target(Some(target.id))
                        .with_action(format!("scroll {}", direction))
                        .with_locator(&locator_text)
                        .with_skeleton(self.skeleton_text())
                        .with_source(source),
                );
                let changed = self.session.perform(&mut self.env, Some(&target), &action)?;
                if !changed {
                    debug!(container = container.id, attempt, "screen did not move");
                    break;
                }

                let unseen = self
                    .session
                    .ensure(&mut self.env)?
                    .descriptions_without_text()
                    .into_iter()
                    .filter(|d| seen.insert(d.clone()))
                    .count();
                if unseen == 0 {
                    debug!(container = container.id, attempt, "scrolling revealed nothing new");
                    break;
                }
            }
        }
        Ok(self.locate(locators))
    }

    /// Replay declared dependency paths of `api` until its locators
    /// resolve or the replay budget runs out.
    fn replay(
        &mut self,
        api: &str,
        locators: &[Locator],
        source: Option<&SourceLocation>,
    ) -> Result<Option<Node>, VerifyError> {
        let Some(paths) = self.catalog.get_api(api).map(|a| a.paths.clone()) else {
            return Ok(None);
        };
        if paths.is_empty() {
            debug!(api, "no dependency paths declared");
            return Ok(None);
        }

        let mut budget = ReplayBudget::new(&self.config);
        for round in 0..self.config.max_replay_rounds {
            let mut progressed = false;

            for (index, path) in paths.iter().take(self.config.max_path_count).enumerate() {
                let steps: Vec<&DependentAction> = if self.config.reverse_dependency_paths {
                    path.iter().rev().collect()
                } else {
                    path.iter().collect()
                };
                debug!(api, round, path = index, steps = steps.len(), "replaying dependency path");

                let mut executed = false;
                for action in steps {
                    if let Some(node) = self.locate(locators) {
                        return Ok(Some(node));
                    }
                    if budget.is_exhausted() {
                        warn!(api, "dependency replay budget exhausted");
                        return Ok(None);
                    }
                    if self.current_screen()?.as_deref() != Some(action.screen.as_str()) {
                        continue;
                    }
                    if action.is_read() {
                        continue;
                    }
                    match self.replay_step(action, source, &mut budget)? {
                        StepOutcome::Executed => executed = true,
                        StepOutcome::Missing if executed => break,
                        StepOutcome::Missing | StepOutcome::Skipped => {}
                    }
                }

                if let Some(node) = self.locate(locators) {
                    return Ok(Some(node));
                }
                if executed {
                    progressed = true;
                    break;
                }
            }

            if !progressed {
                debug!(api, round, "no dependency path made progress");
                break;
            }
        }
        Ok(self.locate(locators))
    }

    fn replay_step(
        &mut self,
        action: &DependentAction,
        source: Option<&SourceLocation>,
        budget: &mut ReplayBudget,
    ) -> Result<StepOutcome, VerifyError> {
        if action.is_back() {
            if !budget.spend() {
                return Ok(StepOutcome::Skipped);
            }
            self.log(
                ExecutionRecord::now(RecordKind::Navigate, self.session.markup())
                    .with_action("back")
                    .with_skeleton(self.skeleton_text())
                    .with_source(source),
            );
            self.session
                .perform(&mut self.env, None, &EnvAction::NavigateBack)?;
            return Ok(StepOutcome::Executed);
        }

        let Some(dep_locators) = action
            .api_name
            .as_deref()
            .and_then(|name| self.catalog.get_api(name))
            .map(|a| a.locators.clone())
        else {
            debug!(action = %action, "dependency step references an undocumented element");
            return Ok(StepOutcome::Missing);
        };

        let target = match self.locate(&dep_locators) {
            Some(node) => Some(node),
            None => self.scroll_search(&dep_locators, source, Some(&mut *budget))?,
        };
        let Some(target) = target else {
            return Ok(StepOutcome::Missing);
        };

        let (kind, text, direction) = dependent_request(&action.kind);
        let env_action = match convert_action(kind, &target, text, direction) {
            Ok(a) => a,
            Err(reason) => {
                debug!(action = %action, reason = %reason, "skipping dependency step");
                return Ok(StepOutcome::Skipped);
            }
        };
        if !budget.spend() {
            return Ok(StepOutcome::Skipped);
        }

        self.log(
            ExecutionRecord::now(RecordKind::Navigate, self.session.markup())
                .with_target(Some(target.id))
                .with_action(kind)
                .with_input(text)
                .with_api(action.api_name.as_deref())
                .with_locator(describe_locators(&dep_locators))
                .with_skeleton(self.skeleton_text())
                .with_source(source),
        );
        self.session
            .perform(&mut self.env, Some(&target), &env_action)?;
        Ok(StepOutcome::Executed)
    }

    fn skeleton_text(&self) -> String {
        self.session
            .tree()
            .map(|t| t.skeleton().render())
            .unwrap_or_default()
    }

    pub(crate) fn log(&self, record: ExecutionRecord) {
        self.logger.log(record);
    }

    /// Append a failure record built from the cached observation only.
    pub(crate) fn record_failure(&self, request: &ActionRequest, api: Option<&str>, locator: &str) {
        self.log(
            ExecutionRecord::now(RecordKind::Failed, self.session.markup())
                .with_action(request.kind)
                .with_input(request.text.as_deref())
                .with_api(api)
                .with_locator(locator)
                .with_skeleton(self.skeleton_text())
                .with_source(request.source.as_ref()),
        );
    }

    /// Failure record for errors that belong to no single element request.
    pub(crate) fn record_step_failure(
        &self,
        action: &str,
        target: Option<&str>,
        source: Option<&SourceLocation>,
    ) {
        self.log(
            ExecutionRecord::now(RecordKind::Failed, self.session.markup())
                .with_action(action)
                .with_api(target)
                .with_skeleton(self.skeleton_text())
                .with_source(source),
        );
    }
}
