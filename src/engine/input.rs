//! `beforeinput` classification

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputTypeGroup {
    Insert,
    Delete,
    DeleteSelection,
    Replace,
    Format,
    Unknown,
}

static INPUT_TYPES: Lazy<HashMap<&'static str, InputTypeGroup>> = Lazy::new(|| {
    use InputTypeGroup::*;

    let groups: [(InputTypeGroup, &[&'static str]); 6] = [
        (
            Insert,
            &[
                "insertText",
                "insertLineBreak",
                "insertParagraph",
                "insertOrderedList",
                "insertUnorderedList",
                "insertHorizontalRule",
                "insertFromDrop",
                "insertFromPaste",
                "insertFromPasteAsQuotation",
                "insertTranspose",
                "insertLink",
            ],
        ),
        (Replace, &["insertReplacementText", "insertFrom", "insertCompositionText"]),
        (
            Delete,
            &[
                "deleteWordBackward",
                "deleteWordForward",
                "deleteSoftLineBackward",
                "deleteSoftLineForward",
                "deleteHardLineBackward",
                "deleteHardLineForward",
                "deleteByDrag",
            ],
        ),
        (DeleteSelection, &["deleteByCut", "deleteContent"]),
        (
            Format,
            &[
                "formatBold",
                "formatUnderline",
                "formatStrikeThrough",
                "formatSuperscript",
                "formatSubscript",
                "formatJustifyFull",
                "formatJustifyCenter",
                "formatJustifyRight",
                "formatJustifyLeft",
                "formatIndent",
                "formatOutdent",
                "formatRemove",
                "formatSetBlockTextDirection",
                "formatSetInlineTextDirection",
                "formatBackColor",
                "formatFontColor",
                "formatFontName",
            ],
        ),
        (Unknown, &["historyUndo", "historyRedo"]),
    ];

    let mut map = HashMap::new();
    for (group, names) in groups {
        for name in names {
            map.insert(*name, group);
        }
    }
    map
});

/// Group of an `inputType` string; anything unlisted is `Unknown`
pub fn classify(input_type: &str) -> InputTypeGroup {
    INPUT_TYPES.get(input_type).copied().unwrap_or(InputTypeGroup::Unknown)
}

pub fn is_paste(input_type: &str) -> bool {
    input_type.starts_with("insertFromPaste")
}
