/// Runtime Execution Engine
///
/// Runs workflow steps and playbooks against injected collaborators:
/// - Sequential fail-fast step runner
/// - Playbook runner (prompt or workflow targets)
/// - Agent completion client and tool registry
/// - Background schedule ticker

// Sequential step runner and progress recorder trait
pub mod runner;

// Playbook dispatch on top of the step runner
pub mod playbook;

// Agent completion collaborator
pub mod agent;

// Tool registry and built-in tools
pub mod tools;

// Background cron ticker for schedule-triggered workflows
pub mod scheduler;

// Re-export main types
pub use playbook::PlaybookRunner;
pub use runner::{RunRecorder, WorkflowStepRunner};
pub use scheduler::ScheduleTicker;
