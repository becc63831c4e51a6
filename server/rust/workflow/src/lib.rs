pub mod adapter;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod usecase;

pub use engine::WorkflowEngine;
