/// stepwise: sequential workflow and parameterized playbook execution
///
/// Stores per-user workflow definitions (ordered agent-prompt, tool-call and
/// delay steps) and playbooks (templated prompts or step lists), runs them
/// fail-fast with per-step results, and exposes everything over HTTP.

// Environment-driven configuration
pub mod config;

// Crate error type and HTTP error mapping
pub mod error;

// SQLite pool and schema
pub mod db;

// Workflow definitions, persistence and run entry points
pub mod workflow;

// Playbook definitions, templating, persistence and run entry points
pub mod playbook;

// Step runner, playbook runner, collaborators and schedule ticker
pub mod runtime;

// HTTP API layer
pub mod api;

// Server setup and initialization
pub mod server;

pub use error::{Error, Result};
pub use playbook::{PlaybookDefinition, PlaybookRun};
pub use runtime::{PlaybookRunner, WorkflowStepRunner};
pub use server::start_server;
pub use workflow::{WorkflowDefinition, WorkflowRun, WorkflowStep};
