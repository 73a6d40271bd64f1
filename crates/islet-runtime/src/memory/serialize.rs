use super::parse::{is_raw_text, is_void};
use super::{MemoryDom, NodeData, NodeId};

pub(super) fn inner_html(dom: &MemoryDom, node: NodeId) -> String {
    let mut out = String::new();
    let raw = matches!(dom.data(node), NodeData::Element { tag, .. } if is_raw_text(tag));
    for child in dom.child_ids(node) {
        write_node(dom, *child, raw, &mut out);
    }
    out
}

pub(super) fn outer_html(dom: &MemoryDom, node: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, node, false, &mut out);
    out
}

fn write_node(dom: &MemoryDom, node: NodeId, raw_text: bool, out: &mut String) {
    match dom.data(node) {
        NodeData::Document => out.push_str(&inner_html(dom, node)),
        NodeData::Text(text) if raw_text => out.push_str(text),
        NodeData::Text(text) => escape_into(text, false, out),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            out.push_str(&inner_html(dom, node));
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_back_to_equivalent_markup() {
        let html = "<div data-islet-root=\"\"><!--start--><p class=\"a&amp;b\">1 &lt; 2<br></p><!--end--></div>";
        let dom = MemoryDom::parse(html);
        assert_eq!(dom.inner_html(dom.document()), html);
    }

    #[test]
    fn script_text_is_not_escaped() {
        let dom = MemoryDom::parse("<script>a && b</script>");
        assert_eq!(dom.inner_html(dom.document()), "<script>a && b</script>");
    }
}
