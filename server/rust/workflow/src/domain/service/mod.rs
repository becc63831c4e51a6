pub mod assignment_resolver;
pub mod transition_engine;

pub use assignment_resolver::{Assignment, AssignmentResolver, ClaimContext, UserDirectory};
pub use transition_engine::{AdvancePlan, TransitionEngine, TransitionError};
