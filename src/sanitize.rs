// src/sanitize.rs

use std::collections::{HashMap, HashSet};

/// Allow-lists governing one sanitization call.
///
/// A policy is declared per rendering context and never mutated afterwards.
/// Tags absent from `allowed_tags` are unwrapped: the tag is dropped but its
/// sanitized children are kept. The exceptions are content-defining elements
/// (`<script>`, `<style>`), whose content is dropped wholesale no matter what
/// the policy says.
#[derive(Debug, Clone)]
pub struct SanitizationPolicy {
    pub allowed_tags: HashSet<String>,
    pub allowed_attributes: HashSet<String>,
    pub allowed_style_properties: HashSet<String>,
}

impl SanitizationPolicy {
    pub fn new<I, J, K>(tags: I, attributes: J, style_properties: K) -> Self
    where
        I: IntoIterator<Item = &'static str>,
        J: IntoIterator<Item = &'static str>,
        K: IntoIterator<Item = &'static str>,
    {
        Self {
            allowed_tags: tags.into_iter().map(str::to_owned).collect(),
            allowed_attributes: attributes.into_iter().map(str::to_owned).collect(),
            allowed_style_properties: style_properties.into_iter().map(str::to_owned).collect(),
        }
    }

    /// Rich policy for list/preview rendering: headings, lists, links,
    /// images, and inline styles limited to typography, color and alignment.
    pub fn summary() -> Self {
        Self::new(
            [
                "p", "br", "strong", "em", "u", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
                "li", "a", "blockquote", "code", "pre", "span", "img", "div",
            ],
            [
                "href", "target", "style", "class", "src", "alt", "rel", "title", "width",
                "height",
            ],
            [
                "color",
                "font-family",
                "font-size",
                "font-weight",
                "text-align",
                "margin",
                "padding",
                "text-decoration",
                "font-style",
            ],
        )
    }

    /// Conservative policy for single-post body rendering: basic text
    /// structure, no images, no inline styles.
    pub fn minimal() -> Self {
        Self::new(
            [
                "a", "b", "blockquote", "br", "code", "em", "h1", "h2", "h3", "h4", "h5", "h6",
                "hr", "i", "li", "ol", "p", "pre", "strong", "u", "ul",
            ],
            ["href", "title"],
            [],
        )
    }
}

/// Reduce untrusted HTML to the subset permitted by `policy`.
///
/// Never panics: malformed or hostile input degrades to its safe subset, and
/// a fully hostile fragment degrades to the empty string. The result is
/// stable under repeated application with the same policy.
///
/// Event-handler attributes and scripting URL schemes are rejected
/// unconditionally, even when a misconfigured policy allow-lists them.
pub fn sanitize(raw: &str, policy: &SanitizationPolicy) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut builder = ammonia::Builder::default();
    builder
        .tags(
            policy
                .allowed_tags
                .iter()
                .map(String::as_str)
                // ammonia treats these as clean-content tags; they may never
                // be allow-listed.
                .filter(|t| !matches!(*t, "script" | "style"))
                .collect(),
        )
        .generic_attributes(
            policy
                .allowed_attributes
                .iter()
                .map(String::as_str)
                .filter(|a| !is_event_handler(a))
                // `rel` is owned by link_rel below.
                .filter(|a| *a != "rel")
                .collect(),
        )
        // Ammonia ships per-tag attribute defaults; clear them so the
        // policy's allow-list is the only authority.
        .tag_attributes(HashMap::new())
        .link_rel(Some("noopener noreferrer"))
        .strip_comments(true);

    let allowed_styles: HashSet<String> = policy
        .allowed_style_properties
        .iter()
        .map(|p| p.to_ascii_lowercase())
        .collect();

    builder.attribute_filter(move |_element, attribute, value| {
        if is_event_handler(attribute) {
            return None;
        }
        if (attribute == "href" || attribute == "src") && has_scripting_scheme(value) {
            return None;
        }
        if attribute == "style" {
            let kept = filter_style_declarations(value, &allowed_styles);
            if kept.is_empty() {
                return None;
            }
            return Some(kept.into());
        }
        Some(value.into())
    });

    builder.clean(raw).to_string()
}

fn is_event_handler(attribute: &str) -> bool {
    let mut chars = attribute.chars();
    matches!(chars.next(), Some('o' | 'O')) && matches!(chars.next(), Some('n' | 'N'))
}

/// True when a URL value could execute code if injected into `href`/`src`.
/// Whitespace and control characters are ignored before matching, since
/// browsers tolerate them inside scheme names.
fn has_scripting_scheme(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    compact.starts_with("javascript:")
        || compact.starts_with("vbscript:")
        || (compact.starts_with("data:") && !compact.starts_with("data:image/"))
}

/// Re-serialize a `style` attribute keeping only allow-listed property
/// names. Declarations that fail to parse are dropped, as are values
/// carrying CSS escape hatches (`url(...)`, `expression(...)`).
fn filter_style_declarations(style: &str, allowed: &HashSet<String>) -> String {
    let mut kept = String::new();
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() || !allowed.contains(&property) {
            continue;
        }
        let lowered = value.to_ascii_lowercase();
        if lowered.contains("url(") || lowered.contains("expression(") || lowered.contains("javascript:")
        {
            continue;
        }
        kept.push_str(&property);
        kept.push(':');
        kept.push_str(value);
        kept.push(';');
    }
    kept
}
