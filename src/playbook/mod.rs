/// Playbook Layer
///
/// Parameterized prompt and workflow templates, their `{{key}}` rendering,
/// persistence and run entry points.

pub mod types;

// Parameter resolution and placeholder substitution
pub mod template;

pub mod storage;

pub mod service;

pub use types::{PlaybookDefinition, PlaybookParameter, PlaybookRun, TargetKind};
