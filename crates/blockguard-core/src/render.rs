//! Server-side block rendering.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

use crate::model::BlockNode;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(?P<key>[A-Za-z0-9_.-]+)\s*(?:\|(?P<default>[^}]*))?\}\}")
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no renderer available for {0}")]
    Unavailable(String),

    #[error("render of {block} failed: {reason}")]
    Failed { block: String, reason: String },
}

/// Regenerates the markup a dynamic block produces for its attributes.
///
/// Implementations must be pure: the same name and attributes always yield
/// byte-identical output. The structural validator depends on this.
pub trait BlockRenderer: Send + Sync {
    fn render(&self, block: &BlockNode) -> Result<String, RenderError>;
}

/// Renders by substituting `{{attr}}` placeholders in a fixed template.
///
/// `{{attr|fallback}}` uses `fallback` when the attribute is absent or null.
/// Strings are inserted verbatim, other JSON values in their compact form.
/// Nested attributes are addressed with dots (`{{style.color}}`).
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl BlockRenderer for TemplateRenderer {
    fn render(&self, block: &BlockNode) -> Result<String, RenderError> {
        let rendered = PLACEHOLDER.replace_all(&self.template, |caps: &Captures<'_>| {
            let key = caps.name("key").map_or("", |m| m.as_str());
            let fallback = caps.name("default").map_or("", |m| m.as_str());
            match lookup(&block.attrs, key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => fallback.to_string(),
                Some(other) => other.to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}

fn lookup<'a>(attrs: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let first = attrs.get(parts.next()?)?;
    parts.try_fold(first, |value, part| value.get(part))
}

/// Stand-in for a dynamic block whose render callback lives elsewhere.
///
/// Always fails, so validation of such blocks degrades to the marker check.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

impl BlockRenderer for UnavailableRenderer {
    fn render(&self, block: &BlockNode) -> Result<String, RenderError> {
        Err(RenderError::Unavailable(block.block_name().to_string()))
    }
}
