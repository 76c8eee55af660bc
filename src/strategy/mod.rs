//! Decision policy and content composition

mod content;
mod decision;

pub use content::{ContentComposer, TemplateComposer};
pub use decision::DecisionEngine;
