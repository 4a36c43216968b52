//! Template rendering of `{{ var }}` placeholders.
//!
//! Manifests are read with their template delimiters swapped for sentinels so
//! the YAML parser never sees `{{`. Operators restore the delimiters right
//! before rendering.

use minijinja::Environment;
use std::collections::HashMap;

use crate::error::OperatorError;

/// Sentinel replacing `{{` in raw manifest text.
pub const OPEN_SENTINEL: &str = "--==";

/// Sentinel replacing `}}` in raw manifest text.
pub const CLOSE_SENTINEL: &str = "==--";

/// Swap template delimiters for sentinels.
pub fn mask_delimiters(raw: &str) -> String {
    raw.replace("{{", OPEN_SENTINEL).replace("}}", CLOSE_SENTINEL)
}

/// Swap sentinels back to template delimiters.
pub fn restore_delimiters(masked: &str) -> String {
    masked
        .replace(OPEN_SENTINEL, "{{")
        .replace(CLOSE_SENTINEL, "}}")
}

/// Template engine with Jinja2-compatible syntax.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Check if a string contains template syntax.
    pub fn is_template(s: &str) -> bool {
        s.contains("{{") || s.contains("{%") || s.contains(OPEN_SENTINEL)
    }

    /// Restore delimiters and render `template` against `variables`.
    ///
    /// Strings without template syntax are returned untouched.
    pub fn render(
        &self,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, OperatorError> {
        if !Self::is_template(template) {
            return Ok(template.to_string());
        }
        let source = restore_delimiters(template);
        Ok(self.env.render_str(&source, variables)?)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
