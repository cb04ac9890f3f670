use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DefinitionError;
use crate::locator::Locator;
use crate::skeleton::Skeleton;
use crate::tree::ElementTree;

use super::dependency::{DependentAction, screen_of};

/// Catalog file layout: `screen -> { skeleton, elements }`.
#[derive(Debug, Deserialize)]
struct RawScreenDoc {
    skeleton: String,
    #[serde(default)]
    elements: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawApiDoc {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    element: Option<String>,
    description: String,
    #[serde(default)]
    effect: Option<String>,
    #[serde(default)]
    state_tag: Option<String>,
    #[serde(default)]
    xpath: Option<LocatorSpec>,
    #[serde(default)]
    paths: Vec<Vec<String>>,
}

/// One locator or an ordered list of fallbacks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocatorSpec {
    One(String),
    Many(Vec<String>),
}

/// A documented element.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEle {
    pub screen: String,
    /// Full `screen__api` name
    pub name: String,
    pub id: Option<String>,
    pub kind: Option<String>,
    pub options: Vec<String>,
    pub element: Option<String>,
    pub description: String,
    pub effect: Option<String>,
    pub state_tag: Option<String>,
    /// First match wins
    pub locators: Vec<Locator>,
    /// Alternative dependency paths, each an ordered action list
    pub paths: Vec<Vec<DependentAction>>,
}

impl ApiEle {
    fn from_raw(screen: &str, key: &str, raw: RawApiDoc) -> Result<Self, DefinitionError> {
        let name = raw.name.unwrap_or_else(|| key.to_string());
        if screen_of(&name) != screen {
            return Err(DefinitionError::Api {
                screen: screen.to_string(),
                api: name,
                reason: "api name is not scoped to its screen".into(),
            });
        }

        let raw_locators = match raw.xpath {
            Some(LocatorSpec::One(l)) => vec![l],
            Some(LocatorSpec::Many(ls)) => ls,
            None => Vec::new(),
        };
        let locators = raw_locators
            .iter()
            .map(|l| {
                Locator::parse(l).map_err(|source| DefinitionError::Locator {
                    api: name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let paths = raw
            .paths
            .iter()
            .map(|path| {
                path.iter()
                    .map(|a| DependentAction::parse(a))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApiEle {
            screen: screen.to_string(),
            name,
            id: raw.id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            kind: raw.kind,
            options: raw.options.unwrap_or_default(),
            element: raw.element,
            description: raw.description,
            effect: raw.effect,
            state_tag: raw.state_tag,
            locators,
            paths,
        })
    }
}

/// A cataloged screen.
#[derive(Debug, Clone)]
pub struct Screen {
    pub name: String,
    pub skeleton: Skeleton,
    /// Api name -> element, in file order
    pub elements: Vec<ApiEle>,
}

impl Screen {
    pub fn api(&self, name: &str) -> Option<&ApiEle> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// The loaded api documentation. Immutable after load.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Screens in file order
    screens: Vec<Screen>,
    /// Skeleton fingerprint -> screen names sharing it
    by_fingerprint: BTreeMap<String, Vec<String>>,
    default_screen: Option<String>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self, DefinitionError> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut screens = Vec::with_capacity(raw.len());
        let mut by_fingerprint: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (screen_name, value) in raw {
            let doc: RawScreenDoc = serde_json::from_value(value)?;
            let skeleton = Skeleton::from_markup(&doc.skeleton).map_err(|e| {
                DefinitionError::Skeleton {
                    screen: screen_name.clone(),
                    reason: e.to_string(),
                }
            })?;

            let mut elements = Vec::with_capacity(doc.elements.len());
            for (key, value) in doc.elements {
                let raw_api: RawApiDoc =
                    serde_json::from_value(value).map_err(|e| DefinitionError::Api {
                        screen: screen_name.clone(),
                        api: key.clone(),
                        reason: e.to_string(),
                    })?;
                elements.push(ApiEle::from_raw(&screen_name, &key, raw_api)?);
            }

            by_fingerprint
                .entry(skeleton.fingerprint())
                .or_default()
                .push(screen_name.clone());
            screens.push(Screen {
                name: screen_name,
                skeleton,
                elements,
            });
        }

        for names in by_fingerprint.values_mut() {
            names.sort();
        }

        let default_screen = screens.first().map(|s| s.name.clone());
        info!(
            screens = screens.len(),
            apis = screens.iter().map(|s| s.elements.len()).sum::<usize>(),
            "loaded api catalog"
        );
        Ok(Catalog {
            screens,
            by_fingerprint,
            default_screen,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let json = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Replace the default screen (first in file order unless set).
    pub fn with_default_screen(mut self, screen: Option<String>) -> Self {
        if screen.is_some() {
            self.default_screen = screen;
        }
        self
    }

    pub fn default_screen(&self) -> Option<&str> {
        self.default_screen.as_deref()
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn screen(&self, name: &str) -> Option<&Screen> {
        self.screens.iter().find(|s| s.name == name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ApiEle> {
        self.screens.iter().flat_map(|s| s.elements.iter())
    }

    pub fn get_api(&self, name: &str) -> Option<&ApiEle> {
        self.screen(screen_of(name))?.api(name)
    }

    /// Which cataloged screen `skeleton` shows.
    ///
    /// Exact matches win (lowest name among duplicates). Otherwise the
    /// screen sharing the largest common structure, ties broken by the
    /// smallest name. A best score of zero is unresolved.
    pub fn resolve_screen(&self, skeleton: &Skeleton) -> Option<&str> {
        if let Some(names) = self.by_fingerprint.get(&skeleton.fingerprint()) {
            if let Some(name) = names.first() {
                return Some(name.as_str());
            }
        }

        let mut best: Option<(usize, &str)> = None;
        for screen in &self.screens {
            let score = screen.skeleton.common(skeleton).count();
            if score == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((s, name)) => score > s || (score == s && screen.name.as_str() < name),
            };
            if better {
                best = Some((score, screen.name.as_str()));
            }
        }
        debug!(?best, "approximate screen resolution");
        best.map(|(_, name)| name)
    }

    /// Whether `api_name` is declared on the screen `skeleton` shows.
    pub fn api_on_current_screen(&self, api_name: &str, skeleton: &Skeleton) -> bool {
        let screen_name = screen_of(api_name);
        let Some(screen) = self.screen(screen_name) else {
            return false;
        };
        if screen.skeleton == *skeleton {
            return true;
        }
        self.resolve_screen(skeleton) == Some(screen_name)
    }

    /// Elements of `screen` whose locator currently resolves in `tree`.
    pub fn present_elements(&self, screen: &str, tree: &ElementTree) -> Vec<&ApiEle> {
        self.screen(screen)
            .map(|s| {
                s.elements
                    .iter()
                    .filter(|e| tree.get_by_locators(&e.locators).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Prompt-style description of a list of elements.
pub fn describe_elements(elements: &[&ApiEle], with_locators: bool) -> String {
    let mut out = String::new();
    for e in elements {
        out.push_str(&format!(
            "\n\nelement: {}\n\tDescription: {}",
            e.name, e.description
        ));
        if let Some(kind) = &e.kind {
            out.push_str(&format!("\n\tType: {}", kind));
        }
        if let Some(effect) = &e.effect {
            out.push_str(&format!("\n\tEffect: {}", effect));
        }
        if with_locators && !e.locators.is_empty() {
            out.push_str(&format!(
                "\n\tLocator: {}",
                crate::locator::describe_locators(&e.locators)
            ));
        }
    }
    out
}
