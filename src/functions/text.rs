//! Message text handling: HTML flattening, cleaning and vendor message remapping.

use std::sync::LazyLock;

use regex::Regex;

use super::{FieldOutput, FunctionRegistry};
use crate::error::{TransformError, TransformResult};

/// Punctuation that survives [`clean_text`] alongside letters, digits and spaces.
pub const KEEP_CHARS: [char; 14] = [
    ' ', '!', '?', '[', ']', '(', ')', '.', '$', '#', '*', ',', ':', ';',
];

/// Vendor message field → canonical column name.
pub const MESSAGE_FIELDS: [(&str, &str); 6] = [
    ("Sender", "sender"),
    ("Timestamp", "dt"),
    ("MessageType", "message_type"),
    ("Message", "message"),
    ("ContactId", "contact_id"),
    ("DisplayName", "display_name"),
];

static INLINE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:a|abbr|b|big|cite|code|del|em|font|i|img|ins|kbd|mark|q|s|samp|small|strike|strong|sub|sup|tt|u|var)\b[^>]*>",
    )
    .expect("inline tag pattern is valid")
});
static BLOCK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:blockquote|dd|dl|dt|h[1-6]|li|ol|pre|ul)\b[^>]*>").expect("block tag pattern is valid")
});
static MD_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([[:punct:]])").expect("escape pattern is valid"));

/// Collapse whitespace to single spaces and drop every character that is not alphanumeric or in
/// [`KEEP_CHARS`]. Idempotent.
pub fn clean_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || KEEP_CHARS.contains(c))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML fragment, with markup removed.
///
/// Tags that would turn into markdown markers (emphasis, headings, list items, links) are
/// removed before conversion, so the only markdown left to undo is character escaping.
/// Characters the author typed survive as written.
pub fn html_to_text(html: &str) -> String {
    let html = INLINE_TAGS.replace_all(html, "");
    let html = BLOCK_TAGS.replace_all(&html, "<br>");
    let markdown = html2md::rewrite_html(&html, false);
    MD_ESCAPE.replace_all(&markdown, "$1").into_owned()
}

/// Flatten HTML when `is_html` is set, then clean.
pub fn parse_message(text: &str, is_html: bool) -> String {
    if is_html {
        clean_text(&html_to_text(text))
    } else {
        clean_text(text)
    }
}

/// Text of one raw vendor message object (`Message`, `IsHtml`), parsed and cleaned.
///
/// Returns `Ok(None)` when `Message` is null.
pub fn raw_message_text(message: &serde_json::Value) -> TransformResult<Option<String>> {
    let obj = message
        .as_object()
        .ok_or_else(|| TransformError::invalid_input("parse_messages", format!("message is not an object: {message}")))?;
    let is_html = obj.get("IsHtml").and_then(|v| v.as_bool()).unwrap_or(false);
    match obj.get("Message") {
        None => Err(TransformError::invalid_input(
            "parse_messages",
            "message has no 'Message' field",
        )),
        Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(parse_message(text, is_html))),
        Some(other) => Err(TransformError::invalid_input(
            "parse_messages",
            format!("'Message' must be a string, got {other}"),
        )),
    }
}

/// Rename vendor message fields to canonical names and replace the text with its parsed form.
///
/// Fields outside [`MESSAGE_FIELDS`] are dropped.
pub fn parse_messages(
    messages: &[serde_json::Value],
) -> TransformResult<Vec<serde_json::Map<String, serde_json::Value>>> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let text = raw_message_text(message)?;
        let mut remapped = serde_json::Map::new();
        if let Some(obj) = message.as_object() {
            for (vendor, canonical) in MESSAGE_FIELDS {
                if let Some(v) = obj.get(vendor) {
                    remapped.insert(canonical.to_string(), v.clone());
                }
            }
        }
        remapped.insert(
            "message".to_string(),
            text.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
        );
        out.push(remapped);
    }
    Ok(out)
}

fn string_fn(
    name: &'static str,
    f: fn(&str) -> String,
) -> impl Fn(&serde_json::Value) -> TransformResult<FieldOutput> + Send + Sync + 'static {
    move |value| match value {
        serde_json::Value::Null => Ok(FieldOutput::Scalar(serde_json::Value::Null)),
        serde_json::Value::String(s) => Ok(FieldOutput::Scalar(serde_json::Value::String(f(s)))),
        other => Err(TransformError::invalid_input(name, format!("expected a string, got {other}"))),
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry
        .register_record("clean_text", string_fn("clean_text", clean_text))
        .register_record("parse_html", string_fn("parse_html", html_to_text))
        .register_record("parse_message", |value| {
            Ok(FieldOutput::Scalar(
                raw_message_text(value)?
                    .map(serde_json::Value::String)
                    .unwrap_or(serde_json::Value::Null),
            ))
        })
        .register_record("parse_messages", |value| {
            let messages = match value {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::Array(items) => parse_messages(items)?,
                other => {
                    return Err(TransformError::invalid_input(
                        "parse_messages",
                        format!("expected a list of messages, got {other}"),
                    ));
                }
            };
            Ok(FieldOutput::Scalar(serde_json::Value::Array(
                messages.into_iter().map(serde_json::Value::Object).collect(),
            )))
        });
}

#[cfg(test)]
mod tests {
    use super::{clean_text, html_to_text, parse_message, parse_messages};
    use crate::functions::{FieldOutput, FunctionRegistry};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn clean_text_collapses_whitespace_and_strips_symbols() {
        assert_eq!(clean_text("  hi\n\nthere\t friend  "), "hi there friend");
        assert_eq!(clean_text("a <b> & c"), "a b c");
        assert_eq!(clean_text("It's $5 (ok)?! #1: yes; no, *maybe*."), "Its $5 (ok)?! #1: yes; no, *maybe*.");
    }

    #[test]
    fn clean_text_keeps_accented_letters() {
        assert_eq!(clean_text("s'est joint à la conversation."), "sest joint à la conversation.");
    }

    #[test]
    fn html_is_flattened_to_text() {
        let text = parse_message("<p>Hello <b>there</b></p>", true);
        assert_eq!(text, "Hello there");
        assert!(!html_to_text("<div><i>hey</i></div>").contains('<'));
    }

    #[test]
    fn html_keeps_typed_markers() {
        assert_eq!(parse_message("<p>1. I feel bad</p>", true), "1. I feel bad");
        assert_eq!(parse_message("<p>rate 5 * 3 = 15</p>", true), "rate 5 * 3 15");
        assert_eq!(
            parse_message("<p># of times: 3 * 2</p>", true),
            parse_message("# of times: 3 * 2", false)
        );
    }

    #[test]
    fn html_structure_leaves_no_markers() {
        assert_eq!(parse_message("<ol><li>one</li><li>two</li></ol>", true), "one two");
        assert_eq!(parse_message("<h2>Title</h2><p><em>soft</em></p>", true), "Title soft");
        assert_eq!(parse_message("<p>see <a href=\"https://x.org\">here</a></p>", true), "see here");
    }

    #[test]
    fn non_html_is_only_cleaned() {
        assert_eq!(parse_message("<b>x</b>\n", false), "bxb");
    }

    #[test]
    fn parse_messages_remaps_vendor_fields() {
        let raw = vec![json!({
            "Sender": "agent1",
            "Timestamp": "2018-02-10T15:00:00Z",
            "MessageType": 3,
            "Message": "hello\nworld",
            "IsHtml": false,
            "ContactId": 77,
            "DisplayName": "Agent",
            "Extra": "dropped"
        })];
        let out = parse_messages(&raw).unwrap();
        assert_eq!(
            serde_json::Value::Object(out[0].clone()),
            json!({
                "sender": "agent1",
                "dt": "2018-02-10T15:00:00Z",
                "message_type": 3,
                "message": "hello world",
                "contact_id": 77,
                "display_name": "Agent"
            })
        );
    }

    #[test]
    fn parse_messages_requires_message_field() {
        let err = parse_messages(&[json!({"Sender": "x"})]).unwrap_err();
        assert!(err.to_string().contains("no 'Message' field"));
    }

    #[test]
    fn registered_string_functions_pass_null_through() {
        let registry = FunctionRegistry::builtin();
        let clean = registry.record("clean_text").unwrap();
        assert_eq!(clean(&json!(null)).unwrap(), FieldOutput::Scalar(json!(null)));
        assert!(clean(&json!(5)).is_err());
        let parse = registry.record("parse_messages").unwrap();
        assert_eq!(parse(&json!(null)).unwrap(), FieldOutput::Scalar(json!([])));
    }

    proptest! {
        #[test]
        fn clean_text_is_idempotent(s in "\\PC*") {
            let once = clean_text(&s);
            prop_assert_eq!(clean_text(&once), once);
        }

        #[test]
        fn clean_text_output_has_no_double_spaces(s in "[a-z \\n\\t<>&-]*") {
            let out = clean_text(&s);
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
