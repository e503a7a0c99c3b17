//! Desk Editor WASM Module
//!
//! A paginated rich-text editor core. Content is a sequence of fixed-size
//! pages holding blocks; text that no longer fits on a page flows onto the
//! next one, splitting at word boundaries with formatting preserved.

pub mod api;
pub mod desk;
pub mod engine;
pub mod models;
pub mod page;
pub mod renderers;
pub mod surface;

// Re-export commonly used types
pub use desk::{Desk, DeskError};
pub use engine::{Engine, EngineEvent, KeyInput, KeyOutcome, RichTextCommands};
pub use models::{BlockData, ChangeEvent, DeskConfig, DeskSnapshot, PageData};
pub use page::{Page, PageState};
pub use surface::{MemoryLayout, MemorySurface, VisualSurface};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    #[cfg(feature = "console_log")]
    console_log::init_with_level(log::Level::Debug).expect("failed to initialize logger");

    log::info!("Desk Editor WASM module initialized");
}
