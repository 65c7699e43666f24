//! MCP tool modules.
//!
//! Tools are grouped the way the REST resources are: vocabulary, concept sets,
//! cohort building, persistence, jobs, sources, service info, and help.

pub mod choices;
pub mod cohorts;
pub mod concept_sets;
pub mod jobs;
pub mod persistence;
pub mod sources;
pub mod vocabulary;
mod context;
mod info;
