//! Attribute to element mapping
//!
//! Each supported text attribute renders to exactly one wrapping element.
//! `tag_contribution` is the inverse used when reading formatting back off a
//! rendered tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::RenderError;

/// Attribute name to value. A `BTreeMap` so iteration is always in canonical
/// (sorted) key order.
pub type Attributes = BTreeMap<String, Value>;

/// A run of text sharing one attribute set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(rename = "insert")]
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with(text: impl Into<String>, attrs: &[(&str, Value)]) -> Self {
        Self {
            text: text.into(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }
}

/// One element in a run's wrapping chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementSpec {
    fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
        }
    }

    fn styled(property: &str, value: &str) -> Self {
        Self {
            tag: "span".to_string(),
            attrs: vec![("style".to_string(), format!("{}: {}", property, value))],
        }
    }
}

fn is_off(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(false))
}

fn string_value(name: &str, value: &Value) -> Result<String, RenderError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(RenderError::InvalidAttributeValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn header_level(value: &Value) -> Option<u64> {
    let level = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (1..=6).contains(&level).then_some(level)
}

/// Element wrapping a single attribute, or `None` when the attribute is off
pub fn render_attribute(name: &str, value: &Value) -> Result<Option<ElementSpec>, RenderError> {
    let known = matches!(
        name,
        "bold" | "italic" | "underline" | "strike" | "code" | "font" | "size" | "color" | "background" | "link"
            | "script" | "header"
    );
    if !known {
        return Err(RenderError::UnsupportedAttribute(name.to_string()));
    }
    if is_off(value) {
        return Ok(None);
    }
    let spec = match name {
        "bold" => ElementSpec::tag("b"),
        "italic" => ElementSpec::tag("i"),
        "underline" => ElementSpec::tag("u"),
        "strike" => ElementSpec::tag("s"),
        "code" => ElementSpec::tag("code"),
        "font" => ElementSpec::styled("font-family", &string_value(name, value)?),
        "size" => ElementSpec::styled("font-size", &string_value(name, value)?),
        "color" => ElementSpec::styled("color", &string_value(name, value)?),
        "background" => ElementSpec::styled("background-color", &string_value(name, value)?),
        "link" => ElementSpec {
            tag: "a".to_string(),
            attrs: vec![("href".to_string(), string_value(name, value)?)],
        },
        "script" => match value.as_str() {
            Some("sub") => ElementSpec::tag("sub"),
            Some("super") => ElementSpec::tag("sup"),
            _ => {
                return Err(RenderError::InvalidAttributeValue {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            }
        },
        _ => match header_level(value) {
            Some(level) => ElementSpec::tag(&format!("h{}", level)),
            None => {
                return Err(RenderError::InvalidAttributeValue {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            }
        },
    };
    Ok(Some(spec))
}

/// Wrapping chain for an attribute set, outermost first, in canonical key order
pub fn render_chain(attributes: &Attributes) -> Result<Vec<ElementSpec>, RenderError> {
    let mut chain = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        if let Some(spec) = render_attribute(name, value)? {
            chain.push(spec);
        }
    }
    Ok(chain)
}

fn style_contribution(style: &str, out: &mut Attributes) {
    for decl in style.split(';') {
        let Some((prop, value)) = decl.split_once(':') else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match prop.trim().to_lowercase().as_str() {
            "font-family" => {
                out.insert("font".to_string(), Value::from(value));
            }
            "font-size" => {
                out.insert("size".to_string(), Value::from(value));
            }
            "color" => {
                out.insert("color".to_string(), Value::from(value));
            }
            "background-color" => {
                out.insert("background".to_string(), Value::from(value));
            }
            "font-weight" if value == "bold" || value == "700" => {
                out.insert("bold".to_string(), Value::Bool(true));
            }
            "font-style" if value == "italic" => {
                out.insert("italic".to_string(), Value::Bool(true));
            }
            _ => {}
        }
    }
}

/// Attributes implied by one element, given its tag and an attribute lookup
pub fn tag_contribution(tag: &str, attribute: impl Fn(&str) -> Option<String>) -> Attributes {
    let mut out = Attributes::new();
    match tag {
        "b" | "strong" => {
            out.insert("bold".to_string(), Value::Bool(true));
        }
        "i" | "em" => {
            out.insert("italic".to_string(), Value::Bool(true));
        }
        "u" => {
            out.insert("underline".to_string(), Value::Bool(true));
        }
        "s" | "strike" | "del" => {
            out.insert("strike".to_string(), Value::Bool(true));
        }
        "code" => {
            out.insert("code".to_string(), Value::Bool(true));
        }
        "sub" => {
            out.insert("script".to_string(), Value::from("sub"));
        }
        "sup" => {
            out.insert("script".to_string(), Value::from("super"));
        }
        "a" => {
            if let Some(href) = attribute("href") {
                out.insert("link".to_string(), Value::from(href));
            }
        }
        "font" => {
            if let Some(face) = attribute("face") {
                out.insert("font".to_string(), Value::from(face));
            }
            if let Some(color) = attribute("color") {
                out.insert("color".to_string(), Value::from(color));
            }
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            if let Some(level) = tag[1..].parse::<u64>().ok() {
                out.insert("header".to_string(), Value::from(level));
            }
        }
        _ => {}
    }
    if let Some(style) = attribute("style") {
        let mut styled = Attributes::new();
        style_contribution(&style, &mut styled);
        for (k, v) in styled {
            out.entry(k).or_insert(v);
        }
    }
    out
}
