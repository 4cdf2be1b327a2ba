use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;

/// Rendered-ish text of an element: scripts and styles skipped, runs of
/// whitespace collapsed, block elements on their own lines.
pub fn visible_text(element: ElementRef) -> String {
    let mut out = TextBuilder::default();
    for child in element.children() {
        visit_node(child, &mut out);
    }
    out.finish()
}

/// Cuts `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn visit_node(node: NodeRef<'_, Node>, out: &mut TextBuilder) {
    match node.value() {
        Node::Text(text) => out.append(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, out);
            }
        }
        _ => {
            for child in node.children() {
                visit_node(child, out);
            }
        }
    }
}

fn visit_element(element: ElementRef, out: &mut TextBuilder) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "script" | "style" | "noscript" | "template" | "svg" | "iframe" => {}
        "br" => out.newline(),
        "p" | "div" | "section" | "article" | "header" | "footer" | "li" | "ul" | "ol"
        | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "tr" | "table" | "blockquote" => {
            out.newline();
            for child in element.children() {
                visit_node(child, out);
            }
            out.newline();
        }
        _ => {
            for child in element.children() {
                visit_node(child, out);
            }
        }
    }
}

#[derive(Default)]
struct TextBuilder {
    buffer: String,
    last_char: Option<char>,
}

impl TextBuilder {
    fn append(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if matches!(self.last_char, None | Some(' ') | Some('\n')) {
                    continue;
                }
                self.push(' ');
            } else {
                self.push(ch);
            }
        }
    }

    fn newline(&mut self) {
        if matches!(self.last_char, None | Some('\n')) {
            return;
        }
        if self.last_char == Some(' ') {
            self.buffer.pop();
        }
        self.push('\n');
    }

    fn push(&mut self, ch: char) {
        self.buffer.push(ch);
        self.last_char = Some(ch);
    }

    fn finish(self) -> String {
        self.buffer.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;

    fn text_of(html: &str) -> String {
        let doc = Html::parse_document(html);
        let body = Selector::parse("body").unwrap();
        visible_text(doc.select(&body).next().unwrap())
    }

    #[test]
    fn collapses_whitespace_and_breaks_blocks() {
        let text = text_of(
            "<body><h2>About   the\n role</h2><p>Build <b>things</b>.</p><script>x()</script></body>",
        );
        assert_eq!(text, "About the role\nBuild things.");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
