/// Workflow Management Layer
///
/// Definitions, SQLite persistence and the service that validates, stores and
/// runs them:
/// - Type definitions (WorkflowDefinition, WorkflowStep, WorkflowRun)
/// - SQLite persistence with sqlx
/// - CRUD and manual/webhook/schedule run entry points

// Core workflow type definitions
pub mod types;

// SQLite persistence layer for workflow storage
pub mod storage;

// CRUD and run entry points
pub mod service;

// Re-export commonly used types
pub use types::{StepAction, WorkflowDefinition, WorkflowRun, WorkflowStep, WorkflowTrigger};
