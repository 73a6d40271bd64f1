//! Server markup in, hydrated and updated component out.

use islet_runtime::markers::render_container;
use islet_runtime::{
    hydrate_all, strip_containerless, Dom, InstanceInfo, InstanceRegistry, MemoryDom, NodeId,
    RenderError, Renderer, VirtualContainer,
};
use serde_json::json;

/// `<span>{props.x}</span>`
struct SpanComponent {
    created: usize,
}

impl Renderer<MemoryDom> for SpanComponent {
    type Tree = String;
    type Handle = NodeId;

    fn hydrate(
        &mut self,
        dom: &mut MemoryDom,
        text: String,
        container: &mut VirtualContainer<MemoryDom>,
    ) -> Result<NodeId, RenderError> {
        if let Some(span) = container.first_child().copied() {
            if dom.tag_name(&span).as_deref() == Some("span") && dom.text_content(&span) == text {
                return Ok(span);
            }
        }

        // mismatch: render from scratch inside the container
        for node in container.child_nodes().to_vec() {
            container.remove_child(dom, &node)?;
        }
        let span = dom.create_element("span")?;
        let label = dom.create_text(&text);
        dom.append_child(&span, &label)?;
        container.append_child(dom, &span)?;
        self.created += 1;
        Ok(span)
    }

    fn update(
        &mut self,
        dom: &mut MemoryDom,
        span: &mut NodeId,
        text: String,
        _container: &mut VirtualContainer<MemoryDom>,
    ) -> Result<(), RenderError> {
        dom.set_text_content(span, &text)?;
        Ok(())
    }
}

fn text_of(info: &InstanceInfo) -> String {
    info.props["x"].to_string()
}

#[test]
fn server_output_hydrates_and_updates() {
    let server_html = render_container("Value", &json!({ "x": 42 }), "<span>42</span>", false);
    assert!(server_html.contains(
        "<!--start--><!--{\"componentName\":\"Value\",\"props\":{\"x\":42}}--><span>42</span><!--end-->"
    ));

    let mut dom = MemoryDom::parse(&format!("<body><p>before</p>{server_html}<p>after</p></body>"));
    let mut registry = InstanceRegistry::new(dom.document());
    let mut component = SpanComponent { created: 0 };

    let mut report = hydrate_all(&mut dom, &mut registry, "Value", &mut component, text_of);
    assert!(report.is_clean());
    assert_eq!(report.hydrated.len(), 1);
    // the server-rendered span was adopted, not recreated
    assert_eq!(component.created, 0);

    let instance = &mut report.hydrated[0];
    instance
        .update(&mut dom, &mut component, "43".to_string())
        .unwrap();

    let body = dom.elements_by_tag(dom.document(), "body")[0];
    assert_eq!(
        dom.inner_html(body),
        "<p>before</p><islet-island data-islet-root=\"\"><!--start--><!--{\"componentName\":\"Value\",\"props\":{\"x\":42}}--><span>43</span><!--end--></islet-island><p>after</p>"
    );
}

#[test]
fn mismatched_markup_is_replaced_inside_the_boundaries_only() {
    let server_html = render_container("Value", &json!({ "x": 7 }), "<b>stale</b>", false);
    let mut dom = MemoryDom::parse(&format!("<div>{server_html}<em>keep</em></div>"));
    let mut registry = InstanceRegistry::new(dom.document());
    let mut component = SpanComponent { created: 0 };

    let report = hydrate_all(&mut dom, &mut registry, "Value", &mut component, text_of);
    assert!(report.is_clean());
    assert_eq!(component.created, 1);

    let island = dom.elements_by_tag(dom.document(), "islet-island")[0];
    assert!(dom.inner_html(island).ends_with("<span>7</span><!--end-->"));
    assert_eq!(dom.elements_by_tag(dom.document(), "em").len(), 1);
}

#[test]
fn containerless_instances_hydrate_in_their_parent() {
    let server_html = render_container("Value", &json!({ "x": 1 }), "<span>1</span>", true);
    let mut dom = MemoryDom::parse(&format!("<nav><a>home</a>{server_html}</nav>"));
    let document = dom.document();
    strip_containerless(&mut dom, &document).unwrap();

    let mut registry = InstanceRegistry::new(document);
    let mut component = SpanComponent { created: 0 };
    let mut report = hydrate_all(&mut dom, &mut registry, "Value", &mut component, text_of);
    assert!(report.is_clean());

    report.hydrated[0]
        .update(&mut dom, &mut component, "2".to_string())
        .unwrap();
    let nav = dom.elements_by_tag(document, "nav")[0];
    assert_eq!(
        dom.inner_html(nav),
        "<a>home</a><!--start--><!--{\"componentName\":\"Value\",\"props\":{\"x\":1}}--><span>2</span><!--end-->"
    );
}
