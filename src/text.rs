use scraper::{Html, Node};
use tracing::debug;

/// Split text into groups of `n` code points.
///
/// The last group holds the remainder. When the length is an exact multiple
/// of `n` (including empty input) an empty trailing group is appended, so
/// callers posting the result must skip empty chunks.
pub fn split(text: &str, n: usize) -> Vec<String> {
    if n == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks: Vec<String> = chars.chunks(n).map(|c| c.iter().collect()).collect();
    if chars.len() % n == 0 {
        chunks.push(String::new());
    }
    chunks
}

/// Render a status body as plain text.
///
/// Text nodes are concatenated in document order and every `<br>` element
/// becomes `\n`. Entities are decoded by the parser.
pub fn html2text(html: &str) -> String {
    debug!("raw: {}", html);

    let fragment = Html::parse_fragment(html);
    let mut text = String::new();
    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }

    debug!("html2text: {}", text);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reconstructs_input() {
        let text = "あいうえおかきくけこさ";
        let chunks = split(text, 4);
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 4);
        assert_eq!(chunks[1].chars().count(), 4);
        assert_eq!(chunks[2].chars().count(), 3);
    }

    #[test]
    fn test_split_exact_multiple_appends_empty_chunk() {
        let chunks = split("abcdef", 3);
        assert_eq!(chunks, vec!["abc", "def", ""]);
    }

    #[test]
    fn test_split_empty_input() {
        assert_eq!(split("", 400), vec![""]);
    }

    #[test]
    fn test_split_zero_width_is_single_chunk() {
        assert_eq!(split("hello", 0), vec!["hello"]);
    }

    #[test]
    fn test_split_counts_code_points_not_bytes() {
        let text = "🦀".repeat(5);
        let chunks = split(&text, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "🦀");
    }

    #[test]
    fn test_html2text_line_break() {
        assert_eq!(html2text("a<br>b"), "a\nb");
        assert_eq!(html2text("a<br/>b<BR />c"), "a\nb\nc");
    }

    #[test]
    fn test_html2text_strips_markup() {
        assert_eq!(html2text("<p>hello</p>"), "hello");
        assert_eq!(
            html2text(
                r#"<p><span class="h-card"><a href="https://example.com/@bot" class="u-url mention">@<span>bot</span></a></span> hi</p>"#
            ),
            "@bot hi"
        );
    }

    #[test]
    fn test_html2text_decodes_entities() {
        assert_eq!(html2text("<p>a &amp; b &lt;3 &#39;x&#x27;</p>"), "a & b <3 'x'");
        assert_eq!(html2text("<p>wait&hellip; done&mdash;ok</p>"), "wait… done—ok");
    }

    #[test]
    fn test_html2text_ignores_attribute_text() {
        assert_eq!(
            html2text(r#"<p><a href="x" title="1>0">link</a> end</p>"#),
            "link end"
        );
    }

    #[test]
    fn test_html2text_break_with_attributes() {
        assert_eq!(html2text(r#"a<br class="soft">b"#), "a\nb");
    }

    #[test]
    fn test_html2text_truncated_tag_keeps_text() {
        assert_eq!(html2text("<p>hello</p><p>x</p><a"), "hellox");
    }

    #[test]
    fn test_html2text_plain_text_passes_through() {
        assert_eq!(html2text("no markup here"), "no markup here");
    }
}
