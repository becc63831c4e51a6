pub mod workflow_instance_repository;
pub mod workflow_template_repository;

pub use workflow_instance_repository::{RepositoryError, WorkflowInstanceRepository};
pub use workflow_template_repository::WorkflowTemplateRepository;
