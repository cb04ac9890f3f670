pub mod budget;
pub mod convert;
pub mod engine_model;
pub mod session;
pub mod verifier;

pub use budget::{BudgetDecision, ReplayBudget, check_action_budget};
pub use engine_model::{
    ActionBudgetPolicy, ActionKind, ActionOutcome, ActionRequest, ElementRef, EngineConfig,
};
pub use session::SessionState;
pub use verifier::Verifier;
