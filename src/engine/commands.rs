//! Host rich-text commands
//!
//! Formatting itself is done by the host. The engine only decides which
//! command an action maps to and hands it to a [`RichTextCommands`]
//! implementation.

use log::{debug, info};

use crate::models::Action;

/// Capability to run a named rich-text command on the host surface
pub trait RichTextCommands {
    /// Run `command` with an optional value; false when the host refused
    fn execute(&mut self, command: &str, value: Option<&str>) -> bool;
}

/// How an action is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPlan {
    /// A host command, with the value used when the caller gives none
    Host {
        name: &'static str,
        default_value: Option<&'static str>,
    },
    /// Emit a save of the whole document
    Save,
    /// Known but not available yet; logged only
    NotImplemented,
}

const fn host(name: &'static str) -> CommandPlan {
    CommandPlan::Host {
        name,
        default_value: None,
    }
}

const fn host_with(name: &'static str, value: &'static str) -> CommandPlan {
    CommandPlan::Host {
        name,
        default_value: Some(value),
    }
}

pub fn plan(action: Action) -> CommandPlan {
    match action {
        Action::MakeBold => host("bold"),
        Action::MakeItalic => host("italic"),
        Action::MakeUnderline => host("underline"),
        Action::MakeStrikethrough => host("strikeThrough"),
        Action::MakeHighlight => host_with("hiliteColor", "yellow"),
        Action::MakeColor => host_with("foreColor", "black"),
        Action::MakeFontName => host("fontName"),
        Action::MakeFontSize => host_with("fontSize", "3"),
        Action::AlignLeft => host("justifyLeft"),
        Action::AlignCenter => host("justifyCenter"),
        Action::AlignRight => host("justifyRight"),
        Action::AlignJustify => host("justifyFull"),
        Action::Indent => host("indent"),
        Action::Unindent => host("outdent"),
        Action::MakeNumberList => host("insertOrderedList"),
        Action::MakeBulletList => host("insertUnorderedList"),
        Action::MakeHeading => host_with("formatBlock", "h2"),
        Action::MakeSubscript => host("subscript"),
        Action::MakeSuperscript => host("superscript"),
        Action::Undo => host("undo"),
        Action::Redo => host("redo"),
        Action::Save => CommandPlan::Save,
        Action::PasteWithFormatting | Action::PasteWithoutFormatting | Action::DoPrint => CommandPlan::NotImplemented,
    }
}

/// Run a host command for `action`. Returns false when nothing was run.
pub fn run<C: RichTextCommands>(commands: &mut C, action: Action, value: Option<&str>) -> bool {
    match plan(action) {
        CommandPlan::Host { name, default_value } => {
            let value = value.or(default_value);
            debug!("Running host command {} ({:?})", name, value);
            commands.execute(name, value)
        }
        CommandPlan::NotImplemented => {
            info!("Action {:?} is not implemented yet", action);
            false
        }
        CommandPlan::Save => false,
    }
}

/// Commands that are only recorded, for hosts without a rich-text surface
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingCommands {
    pub calls: Vec<(String, Option<String>)>,
    /// What every call reports back
    pub accept: bool,
}

impl Default for RecordingCommands {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            accept: true,
        }
    }
}

impl RichTextCommands for RecordingCommands {
    fn execute(&mut self, command: &str, value: Option<&str>) -> bool {
        self.calls.push((command.to_string(), value.map(str::to_string)));
        self.accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_runs_host_command() {
        let mut c = RecordingCommands::default();
        assert!(run(&mut c, Action::MakeBold, None));
        assert_eq!(c.calls, vec![("bold".to_string(), None)]);
    }

    #[test]
    fn test_default_value_and_override() {
        let mut c = RecordingCommands::default();
        run(&mut c, Action::MakeHighlight, None);
        run(&mut c, Action::MakeHighlight, Some("pink"));
        assert_eq!(c.calls[0].1.as_deref(), Some("yellow"));
        assert_eq!(c.calls[1].1.as_deref(), Some("pink"));
    }

    #[test]
    fn test_placeholders_do_not_reach_host() {
        let mut c = RecordingCommands::default();
        for action in [Action::PasteWithFormatting, Action::PasteWithoutFormatting, Action::DoPrint] {
            assert!(!run(&mut c, action, None));
        }
        assert!(c.calls.is_empty());
        assert_eq!(plan(Action::Save), CommandPlan::Save);
    }
}
