//! Element predicates evaluated against the live DOM.
//!
//! Every query is shipped into the page as a JSON literal and interpreted by a
//! single resolver function, so selector text is never spliced in as code.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AdapterError;

/// One way of finding an element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementQuery {
    /// Plain CSS selector.
    Css { selector: String },
    /// The `index`-th match of a CSS selector, visible or not.
    Nth { selector: String, index: usize },
    /// Innermost element whose visible text contains `content`
    /// (case-insensitive, whitespace collapsed). With `within`, only elements
    /// of those tags are considered.
    Text {
        content: String,
        within: Option<Vec<String>>,
    },
    /// Element whose `aria-label` contains the fragment.
    AriaLabel { contains: String, ignore_case: bool },
    /// Matches of `selector` whose `value` property equals `value`.
    InputValue { selector: String, value: String },
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn nth(selector: impl Into<String>, index: usize) -> Self {
        Self::Nth {
            selector: selector.into(),
            index,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            within: None,
        }
    }

    pub fn text_in(tags: &[&str], content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            within: Some(tags.iter().map(|tag| tag.to_string()).collect()),
        }
    }

    pub fn aria_label(contains: impl Into<String>, ignore_case: bool) -> Self {
        Self::AriaLabel {
            contains: contains.into(),
            ignore_case,
        }
    }

    pub fn input_value(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InputValue {
            selector: selector.into(),
            value: value.into(),
        }
    }

    pub fn to_js_literal(&self) -> Result<String, AdapterError> {
        serde_json::to_string(self).map_err(AdapterError::internal)
    }

    /// Wraps `body` in an IIFE where `els` holds every match and `target`
    /// the first visible one (or the only one for `Nth`).
    pub fn script(&self, body: &str) -> Result<String, AdapterError> {
        Ok(format!(
            "(() => {{\n{helpers}\n    const query = {query};\n    const els = resolve(query);\n    const target = query.kind === 'nth' ? (els[0] || null) : (els.find(isVisible) || null);\n{body}\n}})()",
            helpers = JS_HELPERS,
            query = self.to_js_literal()?,
            body = body,
        ))
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementQuery::Css { selector } => f.write_str(selector),
            ElementQuery::Nth { selector, index } => write!(f, "{selector} >> nth={index}"),
            ElementQuery::Text {
                content,
                within: None,
            } => write!(f, "text={content}"),
            ElementQuery::Text {
                content,
                within: Some(tags),
            } => write!(f, "{}:has-text('{content}')", tags.join("|")),
            ElementQuery::AriaLabel {
                contains,
                ignore_case,
            } => {
                if *ignore_case {
                    write!(f, "[aria-label*={contains} i]")
                } else {
                    write!(f, "[aria-label*={contains}]")
                }
            }
            ElementQuery::InputValue { selector, value } => {
                write!(f, "{selector}[value='{value}']")
            }
        }
    }
}

pub(crate) const JS_HELPERS: &str = r#"
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
    const all = (sel) => {
        try { return Array.from(document.querySelectorAll(sel)); } catch (err) { return []; }
    };
    const isVisible = (el) => {
        if (!el || !el.isConnected) { return false; }
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') { return false; }
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };
    const resolve = (q) => {
        switch (q.kind) {
            case 'css':
                return all(q.selector);
            case 'nth': {
                const found = all(q.selector);
                return found[q.index] ? [found[q.index]] : [];
            }
            case 'text': {
                const needle = norm(q.content);
                const scoped = Array.isArray(q.within) && q.within.length > 0;
                const pool = scoped ? all(q.within.join(',')) : all('body *');
                const hits = pool.filter((el) => {
                    const tag = el.tagName;
                    if (tag === 'SCRIPT' || tag === 'STYLE') { return false; }
                    const text = norm(el.innerText || el.textContent || el.value);
                    return text.includes(needle);
                });
                if (scoped) { return hits; }
                return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
            }
            case 'aria_label':
                return all('[aria-label]').filter((el) => {
                    const label = el.getAttribute('aria-label') || '';
                    return q.ignore_case
                        ? label.toLowerCase().includes(q.contains.toLowerCase())
                        : label.includes(q.contains);
                });
            case 'input_value':
                return all(q.selector).filter((el) => el.value === q.value);
            default:
                return [];
        }
    };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mirrors_selector_notation() {
        assert_eq!(ElementQuery::css("select#edit-kur-kod").to_string(), "select#edit-kur-kod");
        assert_eq!(
            ElementQuery::nth("input.hasDatepicker", 1).to_string(),
            "input.hasDatepicker >> nth=1"
        );
        assert_eq!(ElementQuery::text("Kabul Et").to_string(), "text=Kabul Et");
        assert_eq!(
            ElementQuery::text_in(&["a"], "EXCEL İndir").to_string(),
            "a:has-text('EXCEL İndir')"
        );
        assert_eq!(
            ElementQuery::aria_label("kapat", true).to_string(),
            "[aria-label*=kapat i]"
        );
    }

    #[test]
    fn selector_is_embedded_as_json_literal() {
        let query = ElementQuery::css("input[placeholder*='Başlangıç\"]");
        let script = query.script("return els.length;").unwrap();
        assert!(script.contains(r#""selector":"input[placeholder*='Başlangıç\"]""#));
        assert!(script.contains("return els.length;"));
    }

    #[test]
    fn queries_serialize_with_kind_tag() {
        let value = serde_json::to_value(ElementQuery::input_value(
            "input[type='submit']",
            "Listele",
        ))
        .unwrap();
        assert_eq!(value["kind"], "input_value");
        assert_eq!(value["value"], "Listele");
        let value = serde_json::to_value(ElementQuery::text("Tamam")).unwrap();
        assert_eq!(value["kind"], "text");
        assert!(value["within"].is_null());
    }
}
