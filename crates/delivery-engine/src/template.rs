//! Minimal `{{var}}` substitution for delivery templates.

use std::collections::HashMap;

/// Renders delivery templates.
///
/// Placeholders are `{{name}}`; unknown placeholders render as empty so a
/// sparse context never breaks a delivery.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = after[..end].trim();
                    if let Some(value) = vars.get(key) {
                        out.push_str(value);
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unclosed placeholder, emit literally.
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let engine = TemplateEngine::new();
        let out = engine.render(
            "Hello {{user}}, your request is {{status}}.",
            &vars(&[("user", "alice"), ("status", "approved")]),
        );
        assert_eq!(out, "Hello alice, your request is approved.");
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        let engine = TemplateEngine::new();
        let out = engine.render("{{missing}}ok", &vars(&[]));
        assert_eq!(out, "ok");
    }

    #[test]
    fn test_unclosed_placeholder_is_literal() {
        let engine = TemplateEngine::new();
        let out = engine.render("oops {{broken", &vars(&[("broken", "x")]));
        assert_eq!(out, "oops {{broken");
    }

    #[test]
    fn test_whitespace_in_placeholder_is_tolerated() {
        let engine = TemplateEngine::new();
        let out = engine.render("{{ content }}", &vars(&[("content", "hi")]));
        assert_eq!(out, "hi");
    }
}
