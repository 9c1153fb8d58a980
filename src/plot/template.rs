//! Output path templates
//!
//! Templates name figures below the output root with `{placeholder}`
//! substitution. Known placeholders: `case`, `stat`, `mask`, `valid`,
//! `thresh`, `kind`, `family`, `label`.

use crate::errors::{Result, VerifError};
use std::collections::BTreeMap;

pub const PLACEHOLDERS: &[&str] = &["case", "stat", "mask", "valid", "thresh", "kind", "family", "label"];

/// Values substituted into an output template.
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    values: BTreeMap<&'static str, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        let values = PLACEHOLDERS.iter().map(|p| (*p, String::new())).collect();
        Self { values }
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// `_<threshold>` with comparison operators spelled out, or nothing.
    pub fn threshold(self, threshold: Option<&str>) -> Self {
        let text = threshold
            .map(|t| format!("_{}", threshold_token(t)))
            .unwrap_or_default();
        self.set("thresh", text)
    }

    /// `_<label>`, or nothing for an empty label.
    pub fn label(self, label: &str) -> Self {
        let text = if label.is_empty() {
            String::new()
        } else {
            format!("_{}", label)
        };
        self.set("label", text)
    }
}

/// Filename-safe spelling of a threshold such as `>=25.4` (`ge25.4`).
pub fn threshold_token(threshold: &str) -> String {
    let mut out = threshold.to_string();
    for (op, word) in [(">=", "ge"), ("<=", "le"), ("==", "eq"), ("!=", "ne"), (">", "gt"), ("<", "lt")] {
        out = out.replace(op, word);
    }
    out.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Substitutes every `{placeholder}` of `template`.
pub fn expand(template: &str, values: &TemplateValues) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            VerifError::config("output template", template, "unterminated placeholder")
        })?;
        let key = &after[..close];
        let value = values.values.get(key).ok_or_else(|| {
            VerifError::config(
                "output template",
                template,
                format!("unknown placeholder {{{}}}; known: {}", key, PLACEHOLDERS.join(", ")),
            )
        })?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(VerifError::config("output template", template, "unmatched '}'"));
    }
    out.push_str(rest);
    Ok(out)
}
