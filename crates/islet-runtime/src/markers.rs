//! The marker comment protocol.
//!
//! One rendered instance looks like
//!
//! ```text
//! <!--start--><!--{"componentName":"Clock","props":{...}}-->...content...<!--end-->
//! ```
//!
//! The info comment carries JSON in which `<` and `>` are written as
//! `\u003c`/`\u003e`, so no prop value can produce `-->`, `<!--` or `--!>`
//! and terminate the comment early. `JSON.parse` and `serde_json` both read
//! the escapes back transparently.
//!
//! The server build's marker helper module is generated from the constants in
//! this file, so both sides agree on the format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text of the comment opening an instance.
pub const START_MARKER: &str = "start";

/// Text of the comment closing an instance.
pub const END_MARKER: &str = "end";

/// Attribute marking an element whose children carry marker triples.
pub const ROOT_ATTRIBUTE: &str = "data-islet-root";

/// Persistent container element of a regular universal component.
pub const CONTAINER_TAG: &str = "islet-island";

/// Throwaway wrapper of a containerless universal component.
pub const STRIP_TAG: &str = "islet-strip";

/// Key tagging encoded `children` in the info payload's props.
///
/// `{"$islet":"element","type":"em","props":{..}}` is an element with a tag
/// name; `{"$islet":"opaque"}` stands for a child that cannot cross the wire
/// (a component element or a function) and hydrates as `null`.
pub const PROPS_KIND_KEY: &str = "$islet";

/// Payload of the info comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub component_name: String,
    #[serde(default)]
    pub props: Value,
}

/// Serialize the info comment body for a component instance.
pub fn encode_info(component_name: &str, props: &Value) -> String {
    let payload = serde_json::json!({
        "componentName": component_name,
        "props": props,
    });
    escape_comment_json(&payload.to_string())
}

/// Parse an info comment body.
pub fn decode_info(text: &str) -> Result<InstanceInfo, serde_json::Error> {
    serde_json::from_str(text)
}

/// Component name of an info comment that does not decode as a whole.
///
/// Reads the first `"componentName"` string value, so a payload broken after
/// the name still attributes its error.
pub fn component_name_hint(text: &str) -> Option<String> {
    const KEY: &str = "\"componentName\"";
    let rest = &text[text.find(KEY)? + KEY.len()..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    serde_json::Deserializer::from_str(rest)
        .into_iter::<String>()
        .next()?
        .ok()
}

/// Rewrite `<` and `>` as JSON unicode escapes.
///
/// Outside of string literals JSON never contains either character, so the
/// replacement is valid everywhere in the document.
pub fn escape_comment_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            _ => out.push(ch),
        }
    }
    out
}

/// The marker triple around already-rendered `content`.
pub fn embed(component_name: &str, props: &Value, content: &str) -> String {
    format!(
        "<!--{START_MARKER}--><!--{}-->{content}<!--{END_MARKER}-->",
        encode_info(component_name, props)
    )
}

/// Full server output for one instance.
///
/// Regular instances live in a persistent container element that is its own
/// retrieval root. Containerless instances are wrapped in a throwaway
/// [`STRIP_TAG`] element followed by the inline strip script, which promotes
/// the surrounding parent to retrieval root and unwraps the markers into it.
pub fn render_container(
    component_name: &str,
    props: &Value,
    content: &str,
    containerless: bool,
) -> String {
    let triple = embed(component_name, props, content);
    if containerless {
        format!(
            "<{STRIP_TAG}>{triple}</{STRIP_TAG}><script>{}</script>",
            strip_script()
        )
    } else {
        format!("<{CONTAINER_TAG} {ROOT_ATTRIBUTE}=\"\">{triple}</{CONTAINER_TAG}>")
    }
}

/// Inline script emitted after a containerless instance.
///
/// Marks its parent as retrieval root, unwraps every sibling strip element and
/// removes itself.
pub fn strip_script() -> String {
    let strip_node_name = STRIP_TAG.to_ascii_uppercase();
    format!(
        "(function(s){{var p=s.parentNode;p.setAttribute(\"{ROOT_ATTRIBUTE}\",\"\");\
         var w=p.firstChild;while(w){{var n=w.nextSibling;\
         if(w.nodeName===\"{strip_node_name}\"){{while(w.firstChild)p.insertBefore(w.firstChild,w);p.removeChild(w)}}\
         w=n}}p.removeChild(s)}})(document.currentScript)"
    )
}
