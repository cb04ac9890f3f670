pub mod environment;
pub mod mock;
pub mod session;

pub use environment::{EnvAction, Environment, Snapshot};
pub use mock::{MockEnv, Transition, parse_view};
pub use session::DriverSession;
