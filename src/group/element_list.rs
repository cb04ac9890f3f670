use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{ActionKind, ActionOutcome, ActionRequest, ElementRef, Verifier};
use crate::env::Environment;
use crate::error::{EnvError, VerifyError};
use crate::locator::{Locator, describe_locators};
use crate::script::script_model::{MatchQuery, SourceLocation};
use crate::trace::EffectScope;
use crate::tree::{ElementTree, Node};

/// Lazily resolved view over a region of the screen.
///
/// Nothing is looked up until an operation runs; every operation
/// re-resolves the group against the current observation. Elements
/// produced by indexing, iteration or matching come back as new handles
/// with a locator synthesized from their tag and id.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementList {
    target: ElementRef,
    cursor: usize,
    exhausted: bool,
}

impl ElementList {
    /// Group of a documented element. Unknown names fail on first use.
    pub fn from_api(name: &str) -> Self {
        Self::with_target(ElementRef::Api(name.to_string()))
    }

    /// Handle for an element discovered at run time.
    pub fn from_node(node: &Node) -> Self {
        let locator = Locator::for_node(&node.tag, node.id);
        Self::with_target(ElementRef::Located {
            name: locator.to_string(),
            locator,
        })
    }

    fn with_target(target: ElementRef) -> Self {
        ElementList {
            target,
            cursor: 0,
            exhausted: false,
        }
    }

    pub fn target(&self) -> &ElementRef {
        &self.target
    }

    pub fn name(&self) -> &str {
        self.target.name()
    }

    /// Locate the group element itself.
    pub fn resolve<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        source: Option<&SourceLocation>,
    ) -> Result<Node, VerifyError> {
        let request = self.read_request(source);
        verifier.navigate_and_get_target(&self.target, &request)
    }

    /// The n-th direct child of the group, or `None` past the end.
    pub fn index<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        n: usize,
        source: Option<&SourceLocation>,
    ) -> Result<Option<ElementList>, VerifyError> {
        verifier.count_request(&self.read_request(source))?;
        self.child_at(verifier, n, source)
    }

    fn child_at<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        n: usize,
        source: Option<&SourceLocation>,
    ) -> Result<Option<ElementList>, VerifyError> {
        let group = self.resolve(verifier, source)?;
        let tree = cached_tree(verifier)?;
        Ok(tree.children(group.id).get(n).map(|child| ElementList::from_node(child)))
    }

    fn leaf_at<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        n: usize,
        source: Option<&SourceLocation>,
    ) -> Result<Option<ElementList>, VerifyError> {
        let group = self.resolve(verifier, source)?;
        let tree = cached_tree(verifier)?;
        Ok(tree.leaves(group.id).get(n).map(|leaf| ElementList::from_node(leaf)))
    }

    /// Advance the cursor over the group's actionable leaves, in id
    /// order. Once it returns `None` the handle stays exhausted.
    pub fn next<E: Environment>(
        &mut self,
        verifier: &mut Verifier<E>,
        source: Option<&SourceLocation>,
    ) -> Result<Option<ElementList>, VerifyError> {
        if self.exhausted {
            return Ok(None);
        }
        verifier.count_request(&self.read_request(source))?;
        match self.leaf_at(verifier, self.cursor, source)? {
            Some(item) => {
                self.cursor += 1;
                Ok(Some(item))
            }
            None => {
                debug!(group = self.name(), count = self.cursor, "iteration finished");
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// First actionable element of the group, in id order, that matches
    /// `query`. No match is an error.
    pub fn find_match<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        query: &MatchQuery,
        source: Option<&SourceLocation>,
    ) -> Result<ElementList, VerifyError> {
        let request = self.read_request(source);
        verifier.count_request(&request)?;
        let group = self.resolve(verifier, source)?;
        let tree = cached_tree(verifier)?;

        let found = tree.leaves(group.id).into_iter().find(|leaf| {
            let Some(attributes) = tree.get_attributes(leaf.id) else {
                return false;
            };
            let text_match = match query {
                MatchQuery::Text(text) => tree.is_match(leaf.id, text),
                MatchQuery::Attributes(_) => false,
            };
            query.matches(&attributes, text_match)
        });

        match found {
            Some(node) => Ok(ElementList::from_node(node)),
            None => {
                let locator = self.locator_text(verifier);
                verifier.record_failure(&request, self.api_name(), &locator);
                Err(VerifyError::Action {
                    action: "match".into(),
                    target: self.name().to_string(),
                    reason: format!("no element matches {}", describe_query(query)),
                    location: source.cloned(),
                })
            }
        }
    }

    /// Number of direct children. A group that cannot be found counts
    /// as empty.
    pub fn len<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        source: Option<&SourceLocation>,
    ) -> Result<usize, VerifyError> {
        verifier.count_request(&self.read_request(source))?;
        match self.resolve(verifier, source) {
            Ok(group) => Ok(group.children.len()),
            Err(err @ (VerifyError::NotFound { .. } | VerifyError::Locator { .. })) => {
                warn!(group = self.name(), error = %err, "group not found, counting it as empty");
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// Run `request` against its target searched only inside this group.
    pub fn execute_in<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        request: &ActionRequest,
    ) -> Result<ActionOutcome, VerifyError> {
        verifier.count_request(request)?;
        let Some(inner) = request.target.as_ref() else {
            verifier.record_failure(request, None, "");
            return Err(VerifyError::Action {
                action: request.kind.to_string(),
                target: self.name().to_string(),
                reason: "no target element".into(),
                location: request.source.clone(),
            });
        };

        let (api, locators) = match inner {
            ElementRef::Api(name) => match verifier.catalog().get_api(name) {
                Some(api) => (Some(name.as_str()), api.locators.clone()),
                None => {
                    verifier.record_failure(request, Some(name), "");
                    return Err(VerifyError::Doc {
                        name: name.clone(),
                        location: request.source.clone(),
                    });
                }
            },
            ElementRef::Located { locator, .. } => (None, vec![locator.clone()]),
        };
        let locator_text = describe_locators(&locators);

        let group = self.resolve(verifier, request.source.as_ref())?;
        let tree = cached_tree(verifier)?;
        let found = tree
            .extract_subtree(group.id)
            .get_by_locators(&locators)
            .and_then(|n| tree.node(n.id))
            .cloned();

        let Some(node) = found else {
            verifier.record_failure(request, api, &locator_text);
            let expected_here = api.is_some_and(|name| {
                verifier
                    .catalog()
                    .api_on_current_screen(name, &tree.skeleton())
            });
            return Err(if expected_here {
                VerifyError::Locator {
                    name: inner.name().to_string(),
                    locator: locator_text,
                    location: request.source.clone(),
                }
            } else {
                VerifyError::NotFound {
                    name: inner.name().to_string(),
                    locator: locator_text,
                    group: Some(self.name().to_string()),
                    location: request.source.clone(),
                }
            });
        };

        debug!(group = self.name(), id = node.id, "found element inside group");
        verifier.act_on(&node, request, EffectScope::Local)
    }

    pub fn tap_in<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        element: ElementRef,
        source: Option<SourceLocation>,
    ) -> Result<(), VerifyError> {
        let request = ActionRequest::new(ActionKind::Tap, element).with_source(source);
        self.execute_in(verifier, &request).map(|_| ())
    }

    pub fn get_text_in<E: Environment>(
        &self,
        verifier: &mut Verifier<E>,
        element: ElementRef,
        source: Option<SourceLocation>,
    ) -> Result<Option<String>, VerifyError> {
        let request = ActionRequest::new(ActionKind::GetText, element).with_source(source);
        match self.execute_in(verifier, &request)? {
            ActionOutcome::Text(text) => Ok(text),
            _ => Ok(None),
        }
    }

    fn read_request(&self, source: Option<&SourceLocation>) -> ActionRequest {
        ActionRequest::new(ActionKind::GetAttributes, self.target.clone())
            .with_source(source.cloned())
    }

    fn api_name(&self) -> Option<&str> {
        match &self.target {
            ElementRef::Api(name) => Some(name),
            ElementRef::Located { .. } => None,
        }
    }

    fn locator_text<E: Environment>(&self, verifier: &Verifier<E>) -> String {
        match &self.target {
            ElementRef::Api(name) => verifier
                .catalog()
                .get_api(name)
                .map(|a| describe_locators(&a.locators))
                .unwrap_or_default(),
            ElementRef::Located { locator, .. } => locator.to_string(),
        }
    }
}

/// Cached tree after a successful resolution.
fn cached_tree<E: Environment>(verifier: &Verifier<E>) -> Result<&ElementTree, VerifyError> {
    verifier
        .session()
        .tree()
        .ok_or_else(|| EnvError::Observation("no observation cached".into()).into())
}

fn describe_query(query: &MatchQuery) -> String {
    match query {
        MatchQuery::Text(text) => Value::String(text.clone()).to_string(),
        MatchQuery::Attributes(map) => Value::Object(map.clone()).to_string(),
    }
}
