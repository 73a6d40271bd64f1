use islet_runtime::markers::{embed, render_container};
use islet_runtime::{scan_siblings, Dom, InstanceRegistry, MemoryDom};
use serde_json::json;

fn siblings(count: usize) -> String {
    let mut html = String::from("<section data-islet-root=\"\"><h1>title</h1>");
    for i in 0..count {
        html.push_str(&embed("Card", &json!({ "i": i }), &format!("<p>{i}</p>")));
        html.push('\n');
    }
    html.push_str("</section>");
    html
}

#[test]
fn sibling_instances_are_found_in_document_order() {
    for count in [0, 1, 5] {
        let dom = MemoryDom::parse(&siblings(count));
        let section = dom.elements_by_tag(dom.document(), "section")[0];

        let records = scan_siblings(&dom, &section).unwrap();
        assert_eq!(records.len(), count);

        let order: Vec<_> = records.iter().map(|r| r.info.props["i"].clone()).collect();
        let expected: Vec<_> = (0..count).map(|i| json!(i)).collect();
        assert_eq!(order, expected);

        // owned ranges never overlap and hold exactly the rendered paragraph
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.nodes.len(), 1);
            assert_eq!(dom.text_content(&record.nodes[0]), i.to_string());
            for other in records.iter().skip(i + 1) {
                assert!(record.nodes.iter().all(|node| !other.nodes.contains(node)));
            }
        }
    }
}

#[test]
fn registry_groups_instances_across_roots() {
    let html = format!(
        "<header>{}</header><main>{}{}</main>",
        render_container("Nav", &json!({}), "<a>home</a>", false),
        render_container("Card", &json!({ "i": 0 }), "", false),
        render_container("Card", &json!({ "i": 1 }), "", false),
    );
    let dom = MemoryDom::parse(&html);
    let mut registry = InstanceRegistry::new(dom.document());

    assert_eq!(registry.lookup(&dom, "Card").len(), 2);
    assert_eq!(registry.lookup(&dom, "Nav").len(), 1);
    assert_eq!(registry.component_names(&dom), vec!["Nav", "Card"]);
}
