//! Desk Editor WASM API
//!
//! This module provides the JavaScript-facing API for the paginated editor.
//!
//! # Module Structure
//!
//! - `helpers`: JsValue conversions, page-number checks and error reporting
//! - `dom`: the browser implementation of the visual surface
//! - `commands`: rich-text commands through `document.execCommand`
//! - `core`: the `DeskEditor` class and free functions

pub mod helpers;
pub mod commands;
pub mod dom;
pub mod core;

pub use core::*;
pub use dom::DomSurface;
pub use commands::ExecCommand;
