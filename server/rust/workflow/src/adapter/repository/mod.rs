pub mod instance_in_memory;
pub mod instance_postgres;
pub mod template_in_memory;
pub mod template_postgres;

pub use instance_in_memory::InMemoryWorkflowInstanceRepository;
pub use instance_postgres::InstancePostgresRepository;
pub use template_in_memory::InMemoryWorkflowTemplateRepository;
pub use template_postgres::TemplatePostgresRepository;
