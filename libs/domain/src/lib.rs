//! Glyph Domain - Core domain models and types
//!
//! This crate contains the entity types shared by the workflow engine and
//! its persistence layer: identifiers, the workflow/step definition graph,
//! the run context, and the run/run-step execution records.

pub mod context;
pub mod enums;
pub mod ids;
pub mod run;
pub mod workflow;

pub use context::*;
pub use enums::*;
pub use ids::*;
pub use run::*;
pub use workflow::*;
