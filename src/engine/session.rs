use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::env::{EnvAction, Environment, Snapshot};
use crate::error::EnvError;
use crate::tree::{ElementTree, Node};

/// The single owned cache of what the device currently shows.
///
/// Every action that may change the screen goes through [`perform`],
/// which executes it, waits the settle delay, re-observes and updates
/// the change-detection markup, in that order.
///
/// [`perform`]: SessionState::perform
#[derive(Debug)]
pub struct SessionState {
    snapshot: Option<Snapshot>,
    /// Serialized tree of the observation before the current one
    last_markup: Option<String>,
    action_count: usize,
    settle_delay: Duration,
    started_at_ms: Option<u128>,
    ended_at_ms: Option<u128>,
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

impl SessionState {
    pub fn new(settle_delay_ms: u64) -> Self {
        SessionState {
            snapshot: None,
            last_markup: None,
            action_count: 0,
            settle_delay: Duration::from_millis(settle_delay_ms),
            started_at_ms: None,
            ended_at_ms: None,
        }
    }

    /// Forget everything from the previous run.
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.last_markup = None;
        self.action_count = 0;
        self.started_at_ms = None;
        self.ended_at_ms = None;
    }

    pub fn start(&mut self) {
        self.started_at_ms = Some(now_ms());
        self.ended_at_ms = None;
    }

    pub fn finish(&mut self) {
        self.ended_at_ms = Some(now_ms());
    }

    /// Wall time between `start` and `finish` (or now).
    pub fn elapsed_ms(&self) -> u128 {
        match self.started_at_ms {
            Some(start) => self.ended_at_ms.unwrap_or_else(now_ms).saturating_sub(start),
            None => 0,
        }
    }

    /// Count one requested action and return the new total.
    pub fn count_request(&mut self) -> usize {
        self.action_count += 1;
        self.action_count
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Cached tree, without observing.
    pub fn tree(&self) -> Option<&ElementTree> {
        self.snapshot.as_ref().map(|s| &s.tree)
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Cached markup or an empty string; never observes.
    pub fn markup(&self) -> &str {
        self.tree().map_or("", ElementTree::markup)
    }

    /// Observe if nothing is cached yet.
    pub fn ensure<E: Environment>(&mut self, env: &mut E) -> Result<&ElementTree, EnvError> {
        if self.snapshot.is_none() {
            self.refresh(env)?;
        }
        self.tree()
            .ok_or_else(|| EnvError::Observation("no observation cached".into()))
    }

    /// Re-observe the device. Returns whether the serialized tree changed.
    pub fn refresh<E: Environment>(&mut self, env: &mut E) -> Result<bool, EnvError> {
        let snapshot = env.get_state(true)?;
        self.last_markup = self.tree().map(|t| t.markup().to_string());
        let changed = self.last_markup.as_deref() != Some(snapshot.tree.markup());
        trace!(changed, nodes = snapshot.tree.len(), "refreshed observation");
        self.snapshot = Some(snapshot);
        Ok(changed)
    }

    /// Execute `action`, settle, re-observe. Returns whether the screen
    /// changed.
    pub fn perform<E: Environment>(
        &mut self,
        env: &mut E,
        target: Option<&Node>,
        action: &EnvAction,
    ) -> Result<bool, EnvError> {
        env.execute_action(target, action)?;
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        self.refresh(env)
    }

    /// Whether the current observation equals the one before it.
    pub fn is_unchanged(&self) -> bool {
        self.last_markup.as_deref() == Some(self.markup())
    }
}
