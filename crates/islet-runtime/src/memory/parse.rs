//! Lenient HTML fragment parser.
//!
//! Handles the subset of HTML the marker protocol and server renderers
//! produce: elements with attributes, void elements, comments, text with the
//! common entities, and raw-text `<script>`/`<style>` bodies. Unmatched closing
//! tags are ignored; unclosed elements are closed at the end of input.

use super::{MemoryDom, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(super) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(super) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub(super) fn parse_into(dom: &mut MemoryDom, parent: NodeId, html: &str) -> Vec<NodeId> {
    let start_len = dom.child_ids(parent).len();
    let mut stack = vec![parent];
    let mut rest = html;

    while !rest.is_empty() {
        let current = *stack.last().unwrap_or(&parent);

        if let Some(after) = rest.strip_prefix("<!--") {
            let (text, remaining) = match after.find("-->") {
                Some(end) => (&after[..end], &after[end + 3..]),
                None => (after, ""),
            };
            dom.push_child(current, NodeData::Comment(text.to_string()));
            rest = remaining;
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let tag = after[..end].trim().to_ascii_lowercase();
            if let Some(depth) = stack.iter().rposition(|node| {
                matches!(dom.data(*node), NodeData::Element { tag: t, .. } if *t == tag)
            }) {
                // never pop the fragment parent itself
                stack.truncate(depth.max(1));
            }
            rest = after.get(end + 1..).unwrap_or("");
            continue;
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (tag, attributes, self_closing, remaining) = parse_open_tag(&rest[1..]);
            let node = dom.push_child(
                current,
                NodeData::Element {
                    tag: tag.clone(),
                    attributes,
                },
            );
            rest = remaining;

            if is_raw_text(&tag) {
                let close = format!("</{tag}");
                let end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
                if end > 0 {
                    dom.push_child(node, NodeData::Text(rest[..end].to_string()));
                }
                rest = &rest[end..];
                if let Some(after) = rest.get(close.len()..) {
                    let gt = after.find('>').map(|i| i + 1).unwrap_or(after.len());
                    rest = &after[gt..];
                }
            } else if !self_closing && !is_void(&tag) {
                stack.push(node);
            }
            continue;
        }

        // text up to the next tag-like construct
        let first = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        let next = rest[first..]
            .find('<')
            .map(|i| i + first)
            .unwrap_or(rest.len());
        dom.push_child(current, NodeData::Text(decode_entities(&rest[..next])));
        rest = &rest[next..];
    }

    dom.child_ids(parent)[start_len..].to_vec()
}

fn parse_open_tag(input: &str) -> (String, Vec<(String, String)>, bool, &str) {
    let name_end = input
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(input.len());
    let tag = input[..name_end].to_ascii_lowercase();
    let mut rest = &input[name_end..];
    let mut attributes = Vec::new();

    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("/>") {
            return (tag, attributes, true, after);
        }
        if let Some(after) = rest.strip_prefix('>') {
            return (tag, attributes, false, after);
        }
        if let Some(after) = rest.strip_prefix('/') {
            rest = after;
            continue;
        }
        if rest.is_empty() {
            return (tag, attributes, false, rest);
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let value = if let Some(after) = rest.strip_prefix('=') {
            let after = after.trim_start();
            match after.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after[1..];
                    let end = body.find(quote).unwrap_or(body.len());
                    rest = body.get(end + 1..).unwrap_or("");
                    decode_entities(&body[..end])
                }
                _ => {
                    let end = after
                        .find(|c: char| c.is_whitespace() || c == '>')
                        .unwrap_or(after.len());
                    rest = &after[end..];
                    decode_entities(&after[..end])
                }
            }
        } else {
            String::new()
        };

        if !name.is_empty() {
            attributes.push((name, value));
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            }?;
            Some((ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, NodeKind};

    #[test]
    fn parses_nested_elements_and_comments() {
        let dom = MemoryDom::parse("<div id=\"a\"><!--start--><span>42</span><!--end--></div>");
        let div = dom.children(&dom.document())[0];
        assert_eq!(dom.get_attribute(&div, "id").as_deref(), Some("a"));

        let kinds: Vec<_> = dom
            .children(&div)
            .iter()
            .map(|node| dom.node_kind(node))
            .collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Comment, NodeKind::Element, NodeKind::Comment]
        );
    }

    #[test]
    fn comment_body_may_contain_angle_brackets() {
        let dom = MemoryDom::parse("<!--a<b>c-->");
        let comment = dom.children(&dom.document())[0];
        assert_eq!(dom.comment_data(&comment).as_deref(), Some("a<b>c"));
    }

    #[test]
    fn void_and_self_closing_elements_do_not_nest() {
        let dom = MemoryDom::parse("<p>a<br>b<img src=x />c</p>");
        let p = dom.children(&dom.document())[0];
        assert_eq!(dom.children(&p).len(), 5);
    }

    #[test]
    fn script_body_is_raw_text() {
        let dom = MemoryDom::parse("<script>if (a < b) { x(\"</p>\") }</script><i></i>");
        let children = dom.children(&dom.document());
        assert_eq!(children.len(), 2);
        assert_eq!(dom.text_content(&children[0]), "if (a < b) { x(\"</p>\") }");
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let dom = MemoryDom::parse("<a title='x &amp; y'>1 &lt; 2 &#x41;&#66; &bogus;</a>");
        let a = dom.children(&dom.document())[0];
        assert_eq!(dom.get_attribute(&a, "title").as_deref(), Some("x & y"));
        assert_eq!(dom.text_content(&a), "1 < 2 AB &bogus;");
    }

    #[test]
    fn unmatched_close_tag_is_ignored() {
        let dom = MemoryDom::parse("</b><i>x</i>");
        assert_eq!(dom.inner_html(dom.document()), "<i>x</i>");
    }
}
