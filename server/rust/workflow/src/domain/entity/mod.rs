pub mod step_definition;
pub mod step_execution;
pub mod sub_task;
pub mod transition_record;
pub mod workflow_instance;
pub mod workflow_template;
