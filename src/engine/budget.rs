use super::engine_model::{ActionBudgetPolicy, EngineConfig};

#[derive(Debug, PartialEq, Eq)]
pub enum BudgetDecision {
    Allow,
    /// Over the cap under the advisory policy
    Warn,
    Block,
}

/// Decide whether the request numbered `count` (1-based) may run.
pub fn check_action_budget(count: usize, config: &EngineConfig) -> BudgetDecision {
    if count <= config.max_action_count {
        return BudgetDecision::Allow;
    }
    match config.action_budget {
        ActionBudgetPolicy::Advisory => BudgetDecision::Warn,
        ActionBudgetPolicy::Enforced => BudgetDecision::Block,
    }
}

/// Navigation sub-actions still available to one dependency replay.
#[derive(Debug, Clone, Copy)]
pub struct ReplayBudget {
    remaining: usize,
}

impl ReplayBudget {
    pub fn new(config: &EngineConfig) -> Self {
        ReplayBudget {
            remaining: config.replay_budget(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Take one action from the budget; false once exhausted.
    pub fn spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
