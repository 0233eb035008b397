use regex::{Captures, Regex};

use lazy_static::lazy_static;

/// Formatting tags permitted by [`sanitize_html`]. Attributes are always dropped.
pub const ALLOWED_TAGS: &[&str] = &["b", "strong", "i", "em", "u", "p", "br", "ul", "ol", "li"];

lazy_static! {
    static ref SCRIPT_BLOCK: Regex =
        Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?<\s*/\s*(script|style)\s*>").unwrap();
    static ref UNCLOSED_SCRIPT: Regex = Regex::new(r"(?is)<\s*(script|style)\b.*$").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)\b[^>]*>").unwrap();
}

fn drop_script_blocks(input: &str) -> String {
    let without_blocks = SCRIPT_BLOCK.replace_all(input, "");
    UNCLOSED_SCRIPT.replace_all(&without_blocks, "").into_owned()
}

/// Escapes the characters that carry meaning in HTML.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Removes every tag (and the body of script/style elements) and trims the result.
/// Nothing is escaped, so the output is the plain text to store. Values kept by the
/// server go through this; escaping belongs to whoever renders them as HTML.
pub fn strip_tags(input: &str) -> String {
    let without_scripts = drop_script_blocks(input);
    ANY_TAG.replace_all(&without_scripts, "").trim().to_string()
}

/// Plain-text sanitizer for text shown as HTML: [`strip_tags`], then escapes what
/// is left.
pub fn sanitize_text(input: &str) -> String {
    escape_html(&strip_tags(input))
}

/// Rich-text sanitizer: keeps [`ALLOWED_TAGS`] without attributes, drops every other
/// tag, and escapes stray angle brackets in the text between tags.
pub fn sanitize_html(input: &str) -> String {
    let without_scripts = drop_script_blocks(input);
    let mut out = String::with_capacity(without_scripts.len());
    let mut last = 0;

    for caps in TAG.captures_iter(&without_scripts) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        out.push_str(&escape_brackets(&without_scripts[last..whole.start]));
        out.push_str(&rebuild_tag(&caps));
        last = whole.end;
    }
    out.push_str(&escape_brackets(&without_scripts[last..]));
    out.trim().to_string()
}

fn rebuild_tag(caps: &Captures) -> String {
    let closing = caps.get(1).map_or("", |m| m.as_str());
    let name = caps
        .get(2)
        .map_or(String::new(), |m| m.as_str().to_lowercase());

    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return String::new();
    }
    if name == "br" {
        return "<br>".to_string();
    }
    format!("<{}{}>", closing, name)
}

fn escape_brackets(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_text_strips_tags_and_escapes() {
        assert_eq!(sanitize_text("  <b>Hello</b> world  "), "Hello world");
        assert_eq!(
            sanitize_text("<script>alert('x')</script>Tom & Jerry"),
            "Tom &amp; Jerry"
        );
        assert_eq!(sanitize_text("a \"quote\""), "a &quot;quote&quot;");
        assert_eq!(sanitize_text("<img src=x onerror=alert(1)>"), "");
        assert_eq!(sanitize_text("1 < 2"), "1 &lt; 2");
    }

    #[test]
    fn test_strip_tags_keeps_text_unescaped() {
        assert_eq!(strip_tags("  Joana D'Arc "), "Joana D'Arc");
        assert_eq!(strip_tags("<b>Tom</b> & Jerry"), "Tom & Jerry");
        assert_eq!(strip_tags("Don't <script>x()</script>panic"), "Don't panic");
        assert_eq!(strip_tags("<img src=x onerror=alert(1)>"), "");
    }

    #[test]
    fn test_sanitize_text_unclosed_script() {
        assert_eq!(sanitize_text("safe <script>steal()"), "safe");
    }

    #[test]
    fn test_sanitize_html_keeps_allowed_tags_without_attributes() {
        assert_eq!(
            sanitize_html(r#"<p class="x" onclick="evil()">Prune <strong>roses</strong></p>"#),
            "<p>Prune <strong>roses</strong></p>"
        );
        assert_eq!(
            sanitize_html("<ul><li>Mow</li><LI>Water</LI></ul><br/>"),
            "<ul><li>Mow</li><li>Water</li></ul><br>"
        );
    }

    #[test]
    fn test_sanitize_html_drops_disallowed_tags_and_scripts() {
        assert_eq!(
            sanitize_html(r#"<div><a href="javascript:x()">link</a><script>bad()</script></div>"#),
            "link"
        );
        assert_eq!(
            sanitize_html("<iframe src=evil></iframe><em>ok</em>"),
            "<em>ok</em>"
        );
        assert_eq!(sanitize_html("3 > 2 and 1 <2"), "3 &gt; 2 and 1 &lt;2");
    }
}
