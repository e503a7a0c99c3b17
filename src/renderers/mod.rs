//! Renderers module for the paginated editor
//!
//! Converts runs of attributed text into a minimal nested element tree, and
//! recovers attributes from a rendered tree.
//!
//! ## Modules
//!
//! - `attributes`: one attribute to one wrapping element, and back
//! - `tree`: the open/sealed merge tree that shares wrappers between runs
//! - `parser`: ancestor-chain walk that reads attributes back off a surface

pub mod attributes;
pub mod parser;
pub mod tree;

// Re-export commonly used types
pub use attributes::{render_attribute, render_chain, Attributes, ElementSpec, TextRun};
pub use parser::{parse_attributes, parse_html, runs_for_leaves};
pub use tree::RenderTree;

use thiserror::Error;

use crate::surface::html::{to_html, Fragment};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Unsupported attribute '{0}'")]
    UnsupportedAttribute(String),

    #[error("Invalid value {value} for attribute '{name}'")]
    InvalidAttributeValue { name: String, value: String },
}

/// Render runs into a forest of fragments. Fails on the first unsupported
/// attribute; nothing is rendered in that case.
pub fn render_runs(runs: &[TextRun]) -> Result<Vec<Fragment>, RenderError> {
    let mut tree = RenderTree::new();
    for run in runs {
        let chain = render_chain(&run.attributes)?;
        tree.insert(chain, &run.text);
    }
    Ok(tree.collapse())
}

/// Render runs straight to markup
pub fn render_html(runs: &[TextRun]) -> Result<String, RenderError> {
    Ok(to_html(&render_runs(runs)?))
}
