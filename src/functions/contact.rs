//! Contact-level helpers: handler splitting and survey distress scores.

use super::text::raw_message_text;
use super::{FieldOutput, FunctionRegistry};
use crate::error::{TransformError, TransformResult};

/// Messages carrying a pre-chat survey contain one of these.
pub const SURVEY_MARKERS: [&str; 3] = [
    "User profile:",
    "Pre survey response",
    "Sondage avant le clavardage",
];

/// The score follows the first of these questions found in a survey message.
pub const SCORE_QUESTIONS: [&str; 2] = ["How upset are you right now?:", "en ce moment?:"];

/// Primary and secondary agents of one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handlers {
    pub agent_id: Option<String>,
    /// Remaining handlers, comma-joined; `None` with fewer than two handlers.
    pub secondary_agents: Option<String>,
}

impl Handlers {
    /// The first handler is primary; the rest are secondary.
    pub fn split(handlers: &[String]) -> Self {
        match handlers.split_first() {
            None => Self {
                agent_id: None,
                secondary_agents: None,
            },
            Some((first, rest)) => Self {
                agent_id: Some(first.clone()),
                secondary_agents: (!rest.is_empty()).then(|| rest.join(",")),
            },
        }
    }

    fn into_fields(self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        out.insert("agent_id".to_string(), self.agent_id.into());
        out.insert("secondary_agents".to_string(), self.secondary_agents.into());
        out
    }
}

/// Scan survey messages for the self-reported distress score.
///
/// Only messages containing one of [`SURVEY_MARKERS`] are considered; the text after the first
/// matching [`SCORE_QUESTIONS`] entry is returned trimmed. Stops at the first hit.
pub fn extract_distress_score<'a, I>(messages: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    messages
        .into_iter()
        .filter(|text| SURVEY_MARKERS.iter().any(|m| text.contains(m)))
        .find_map(|text| {
            SCORE_QUESTIONS
                .iter()
                .find_map(|q| text.split_once(q))
                .map(|(_, rest)| rest.trim().to_string())
        })
}

/// Leading number of a score string, truncated to an integer (`"7.0 thanks"` → `7`).
pub fn parse_score(raw: &str) -> Option<i64> {
    let token = raw.split_whitespace().next()?;
    let value: f64 = token.trim_end_matches(['.', ',']).parse().ok()?;
    value.is_finite().then(|| value.trunc() as i64)
}

fn handler_names(value: &serde_json::Value) -> TransformResult<Vec<String>> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s.clone()),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                other => Err(TransformError::invalid_input(
                    "parse_handlers",
                    format!("handler must be a string or number, got {other}"),
                )),
            })
            .collect(),
        other => Err(TransformError::invalid_input(
            "parse_handlers",
            format!("expected a list of handlers, got {other}"),
        )),
    }
}

fn message_texts(value: &serde_json::Value) -> TransformResult<Vec<String>> {
    let items = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(items) => items,
        other => {
            return Err(TransformError::invalid_input(
                "distress_score",
                format!("expected a list of messages, got {other}"),
            ));
        }
    };
    let mut texts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            serde_json::Value::String(s) => texts.push(s.clone()),
            serde_json::Value::Object(_) => texts.extend(raw_message_text(item)?),
            serde_json::Value::Null => {}
            other => {
                return Err(TransformError::invalid_input(
                    "distress_score",
                    format!("unexpected message {other}"),
                ));
            }
        }
    }
    Ok(texts)
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry
        .register_record("parse_handlers", |value| {
            let names = handler_names(value)?;
            Ok(FieldOutput::Fields(Handlers::split(&names).into_fields()))
        })
        .register_record("distress_score", |value| {
            let texts = message_texts(value)?;
            let score = extract_distress_score(texts.iter().map(String::as_str))
                .as_deref()
                .and_then(parse_score);
            Ok(FieldOutput::Scalar(score.into()))
        });
}

#[cfg(test)]
mod tests {
    use super::{extract_distress_score, parse_score, Handlers};
    use crate::functions::{FieldOutput, FunctionRegistry};
    use serde_json::json;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_handlers_cases() {
        assert_eq!(
            Handlers::split(&[]),
            Handlers {
                agent_id: None,
                secondary_agents: None
            }
        );
        assert_eq!(
            Handlers::split(&names(&["A"])),
            Handlers {
                agent_id: Some("A".into()),
                secondary_agents: None
            }
        );
        assert_eq!(
            Handlers::split(&names(&["A", "B", "C"])),
            Handlers {
                agent_id: Some("A".into()),
                secondary_agents: Some("B,C".into())
            }
        );
    }

    #[test]
    fn parse_handlers_fans_out_two_fields() {
        let registry = FunctionRegistry::builtin();
        let f = registry.record("parse_handlers").unwrap();
        let out = f(&json!(["A", "B"])).unwrap();
        let FieldOutput::Fields(map) = out else {
            panic!("expected fields");
        };
        assert_eq!(
            serde_json::Value::Object(map),
            json!({"agent_id": "A", "secondary_agents": "B"})
        );
        let FieldOutput::Fields(map) = f(&json!(null)).unwrap() else {
            panic!("expected fields");
        };
        assert_eq!(
            serde_json::Value::Object(map),
            json!({"agent_id": null, "secondary_agents": null})
        );
    }

    #[test]
    fn distress_score_found_after_marker() {
        let msgs = ["hello", "Pre survey response How upset are you right now?: 7"];
        assert_eq!(extract_distress_score(msgs), Some("7".to_string()));
    }

    #[test]
    fn distress_score_french() {
        let msgs = ["Sondage avant le clavardage Es-tu bouleversé en ce moment?: 4"];
        assert_eq!(extract_distress_score(msgs), Some("4".to_string()));
    }

    #[test]
    fn distress_score_requires_marker() {
        assert_eq!(extract_distress_score(["How upset are you right now?: 9"]), None);
        assert_eq!(extract_distress_score(["hello", "bye"]), None);
        assert_eq!(extract_distress_score(Vec::<&str>::new()), None);
    }

    #[test]
    fn distress_score_stops_at_first_match() {
        let msgs = [
            "User profile: How upset are you right now?: 3",
            "Pre survey response How upset are you right now?: 8",
        ];
        assert_eq!(extract_distress_score(msgs), Some("3".to_string()));
    }

    #[test]
    fn parse_score_truncates_floats() {
        assert_eq!(parse_score("7"), Some(7));
        assert_eq!(parse_score("7.9 thanks"), Some(7));
        assert_eq!(parse_score("n/a"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn registered_distress_score_reads_raw_messages() {
        let registry = FunctionRegistry::builtin();
        let f = registry.record("distress_score").unwrap();
        let out = f(&json!([
            {"Message": "<p>hi</p>", "IsHtml": true},
            {"Message": "Pre survey response\nHow upset are you right now?: 6", "IsHtml": false}
        ]))
        .unwrap();
        assert_eq!(out, FieldOutput::Scalar(json!(6)));
        assert_eq!(f(&json!([])).unwrap(), FieldOutput::Scalar(json!(null)));
    }
}
