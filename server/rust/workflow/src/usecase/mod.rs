pub mod add_sub_task;
pub mod advance_step;
pub mod cancel_instance;
pub mod check_sla_breaches;
pub mod complete_sub_task;
pub mod conflict_retry;
pub mod create_instance;
pub mod force_reassign;
pub mod get_history;
pub mod get_instance;
pub mod get_template;
pub mod list_sub_tasks;
mod notification;
pub mod publish_template;

pub use add_sub_task::{AddSubTaskError, AddSubTaskUseCase};
pub use advance_step::{AdvanceStepError, AdvanceStepUseCase};
pub use cancel_instance::{CancelInstanceError, CancelInstanceUseCase};
pub use check_sla_breaches::{CheckSlaBreachesError, CheckSlaBreachesUseCase};
pub use complete_sub_task::{CompleteSubTaskError, CompleteSubTaskUseCase};
pub use conflict_retry::ConflictRetryPolicy;
pub use create_instance::{CreateInstanceError, CreateInstanceUseCase};
pub use force_reassign::{ForceReassignError, ForceReassignUseCase};
pub use get_history::{GetHistoryError, GetHistoryUseCase};
pub use get_instance::{GetInstanceError, GetInstanceUseCase};
pub use get_template::{GetTemplateError, GetTemplateUseCase};
pub use list_sub_tasks::{ListSubTasksError, ListSubTasksUseCase};
pub use publish_template::{PublishTemplateError, PublishTemplateUseCase};
