//! Containerless instances.
//!
//! The server wraps a containerless instance's marker triple in a throwaway
//! [`STRIP_TAG`] element and follows it with an inline script. In a browser the
//! script runs during parsing; [`strip_containerless`] applies the same effect
//! to a DOM that was built without executing scripts.

use crate::dom::{Dom, DomError};
use crate::markers::{strip_script, ROOT_ATTRIBUTE, STRIP_TAG};

/// Apply every strip script found under `root`.
///
/// For each script: its parent becomes a retrieval root, every sibling strip
/// element is replaced by its children, and the script is removed. Returns the
/// number of scripts applied.
pub fn strip_containerless<D: Dom>(dom: &mut D, root: &D::Node) -> Result<usize, DomError> {
    let script_text = strip_script();
    let scripts: Vec<D::Node> = dom
        .descendant_elements(root)
        .into_iter()
        .filter(|node| {
            dom.tag_name(node).as_deref() == Some("script") && dom.text_content(node) == script_text
        })
        .collect();

    let mut applied = 0;
    for script in scripts {
        // an earlier script may already have unwrapped and removed this one's
        // strip siblings; the parent is what matters
        let Some(parent) = dom.parent(&script) else {
            continue;
        };
        dom.set_attribute(&parent, ROOT_ATTRIBUTE, "")?;

        for wrapper in dom.children(&parent) {
            if dom.tag_name(&wrapper).as_deref() != Some(STRIP_TAG) {
                continue;
            }
            for child in dom.children(&wrapper) {
                dom.insert_before(&parent, &child, Some(&wrapper))?;
            }
            dom.remove_child(&parent, &wrapper)?;
        }

        dom.remove_child(&parent, &script)?;
        applied += 1;
    }

    tracing::debug!(applied, "unwrapped containerless instances");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::render_container;
    use crate::memory::MemoryDom;
    use crate::scan::scan_subtree;
    use serde_json::json;

    #[test]
    fn unwraps_markers_into_the_parent() {
        let html = format!(
            "<ul><li>static</li>{}</ul>",
            render_container("Item", &json!({ "n": 1 }), "<li>1</li>", true)
        );
        let mut dom = MemoryDom::parse(&html);
        let document = dom.document();

        assert_eq!(strip_containerless(&mut dom, &document).unwrap(), 1);

        let list = dom.elements_by_tag(document, "ul")[0];
        assert_eq!(
            dom.outer_html(list),
            "<ul data-islet-root=\"\"><li>static</li><!--start--><!--{\"componentName\":\"Item\",\"props\":{\"n\":1}}--><li>1</li><!--end--></ul>"
        );

        let (records, errors) = scan_subtree(&dom, &document);
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn two_siblings_share_one_parent() {
        let html = format!(
            "<p>{}{}</p>",
            render_container("A", &json!({}), "a", true),
            render_container("A", &json!({}), "b", true)
        );
        let mut dom = MemoryDom::parse(&html);
        let document = dom.document();

        assert_eq!(strip_containerless(&mut dom, &document).unwrap(), 2);
        assert!(dom.elements_by_tag(document, STRIP_TAG).is_empty());
        assert!(dom.elements_by_tag(document, "script").is_empty());

        let (records, _) = scan_subtree(&dom, &document);
        let texts: Vec<_> = records
            .iter()
            .map(|record| dom.text_content(&record.nodes[0]))
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn unrelated_scripts_are_left_alone() {
        let mut dom = MemoryDom::parse("<div><script>console.log(1)</script></div>");
        let document = dom.document();
        assert_eq!(strip_containerless(&mut dom, &document).unwrap(), 0);
        assert_eq!(dom.elements_by_tag(document, "script").len(), 1);
    }
}
