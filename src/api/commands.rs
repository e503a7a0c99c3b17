//! Rich-text commands through `document.execCommand`

use log::{debug, error};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlDocument;

use crate::engine::RichTextCommands;

pub struct ExecCommand {
    document: HtmlDocument,
}

impl ExecCommand {
    pub fn new(document: &web_sys::Document) -> Result<Self, JsValue> {
        let document = document
            .clone()
            .dyn_into::<HtmlDocument>()
            .map_err(|_| JsValue::from_str("Document is not an HTML document"))?;
        Ok(Self { document })
    }
}

impl RichTextCommands for ExecCommand {
    fn execute(&mut self, command: &str, value: Option<&str>) -> bool {
        debug!("execCommand({}, {:?})", command, value);
        match self
            .document
            .exec_command_with_show_ui_and_value(command, false, value.unwrap_or_default())
        {
            Ok(done) => done,
            Err(e) => {
                error!("execCommand {} failed: {:?}", command, e);
                false
            }
        }
    }
}
