use scraper::{Html, Node};
use serde::Serialize;

pub const LINK_LABEL: &str = "Go by link";

/// Element bodies that never contribute visible text.
const DROPPED_ELEMENTS: [&str; 7] = ["script", "style", "iframe", "object", "embed", "noscript", "template"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRule { Plain, Link }

impl CellRule {
    pub fn for_column(name: &str) -> CellRule {
        let key = name.to_lowercase();
        if key.contains("link") || key.contains("profile") { CellRule::Link } else { CellRule::Plain }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Text(String),
    Link { href: String },
}

impl DisplayValue {
    /// Text for the cell, or the link target.
    pub fn plain(&self) -> &str {
        match self { DisplayValue::Text(s) => s, DisplayValue::Link { href } => href }
    }

    pub fn to_html(&self) -> String {
        match self {
            DisplayValue::Text(s) => html_escape(s),
            DisplayValue::Link { href } => format!("<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>", html_escape(href), LINK_LABEL),
        }
    }

    pub fn to_markdown(&self) -> String {
        match self {
            DisplayValue::Text(s) => md_escape(s),
            DisplayValue::Link { href } => format!("[{}]({})", LINK_LABEL, href.replace(' ', "%20").replace(')', "%29").replace('|', "%7C")),
        }
    }
}

/// Treats `raw` as untrusted HTML and keeps only its text content.
pub fn sanitize(raw: &str) -> String {
    if !raw.contains(['<', '&']) { return raw.to_string(); }
    let frag = Html::parse_fragment(raw);
    let mut out = String::with_capacity(raw.len());
    for node in frag.tree.root().descendants() {
        if let Node::Text(t) = node.value() {
            let hidden = node.ancestors().any(|a| a.value().as_element().is_some_and(|e| DROPPED_ELEMENTS.contains(&e.name())));
            if !hidden { out.push_str(&t.text); }
        }
    }
    out
}

/// Blank out anything carrying a `javascript:` scheme. Tab and newline are ignored
/// while matching since browsers strip them from URLs.
pub fn guard_scheme(value: String) -> String {
    let probe: String = value.chars().filter(|c| !matches!(c, '\t' | '\n' | '\r')).collect::<String>().to_lowercase();
    if probe.contains("javascript:") { String::new() } else { value }
}

pub fn render_cell(column_name: &str, raw: &str, sanitize_cells: bool) -> DisplayValue {
    render_with_rule(CellRule::for_column(column_name), raw, sanitize_cells)
}

pub fn render_with_rule(rule: CellRule, raw: &str, sanitize_cells: bool) -> DisplayValue {
    let value = if sanitize_cells { sanitize(raw) } else { raw.to_string() };
    let value = guard_scheme(value);
    match rule {
        CellRule::Link if !value.is_empty() => DisplayValue::Link { href: value },
        _ => DisplayValue::Text(value),
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&#39;")
}

fn md_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_columns_get_the_affordance() {
        let v = render_cell("Profile Link", "http://x.test", true);
        assert_eq!(v, DisplayValue::Link { href: "http://x.test".into() });
        assert_eq!(v.to_html(), "<a href=\"http://x.test\" target=\"_blank\" rel=\"noopener noreferrer\">Go by link</a>");
        assert!(matches!(render_cell("LINKEDIN", "abc", false), DisplayValue::Link { .. }));
        assert!(matches!(render_cell("Profile", "not a url at all", true), DisplayValue::Link { .. }));
    }

    #[test]
    fn plain_columns_stay_text() {
        assert_eq!(render_cell("Name", "Alice", true), DisplayValue::Text("Alice".into()));
        assert_eq!(render_cell("Name", "http://x.test", true), DisplayValue::Text("http://x.test".into()));
    }

    #[test]
    fn empty_link_value_is_plain_empty_text() {
        assert_eq!(render_cell("Profile Link", "", true), DisplayValue::Text(String::new()));
    }

    #[test]
    fn javascript_scheme_is_blanked_in_any_case() {
        for raw in ["javascript:alert(1)", "JaVaScRiPt:alert(1)", "see javascript:void(0)", "java\tscript:alert(1)", "<b>javascript:</b>x"] {
            for col in ["Name", "Profile Link"] {
                for sanitize in [true, false] {
                    let v = render_cell(col, raw, sanitize);
                    assert_eq!(v, DisplayValue::Text(String::new()), "{col} {raw:?} {sanitize}");
                }
            }
        }
    }

    #[test]
    fn output_never_contains_the_scheme() {
        let inputs = ["javascript:x", "JAVASCRIPT:x", "<a href=\"javascript:x\">y</a>", "java&#115;cript:x", "<script>javascript:1</script>ok"];
        for raw in inputs {
            for sanitize in [true, false] {
                let html = render_cell("Profile", raw, sanitize).to_html().to_lowercase();
                assert!(!html.contains("javascript:"), "{raw:?} -> {html}");
            }
        }
    }

    #[test]
    fn sanitize_drops_markup_and_script_bodies() {
        assert_eq!(sanitize("<b>Bold</b> move"), "Bold move");
        assert_eq!(sanitize("hi<script>alert(1)</script>"), "hi");
        assert_eq!(sanitize("<img src=x onerror=alert(1)>"), "");
        assert_eq!(sanitize("<style>body{}</style>Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(sanitize("plain text"), "plain text");
    }

    #[test]
    fn unsanitized_markup_is_escaped_not_executed() {
        let v = render_cell("Name", "<script>alert(1)</script>", false);
        assert_eq!(v.to_html(), "&lt;script&gt;alert(1)&lt;/script&gt;");
    }

    #[test]
    fn href_attribute_is_escaped() {
        let v = render_cell("Link", "http://x.test/?a=1&b=\"2\"", false);
        assert_eq!(v.to_html(), "<a href=\"http://x.test/?a=1&amp;b=&quot;2&quot;\" target=\"_blank\" rel=\"noopener noreferrer\">Go by link</a>");
    }

    #[test]
    fn rendering_is_pure() {
        for (col, raw) in [("Profile Link", "<i>http://x.test</i>"), ("Name", "a<script>b</script>"), ("Link", "")] {
            assert_eq!(render_cell(col, raw, true), render_cell(col, raw, true));
        }
    }

    #[test]
    fn markdown_forms() {
        assert_eq!(DisplayValue::Text("a|b\nc".into()).to_markdown(), "a\\|b c");
        assert_eq!(DisplayValue::Link { href: "http://x.test/a b".into() }.to_markdown(), "[Go by link](http://x.test/a%20b)");
    }

    #[test]
    fn rule_detection_is_case_insensitive() {
        assert_eq!(CellRule::for_column("LinkedIn URL"), CellRule::Link);
        assert_eq!(CellRule::for_column("Github PROFILE"), CellRule::Link);
        assert_eq!(CellRule::for_column("Name"), CellRule::Plain);
    }
}
