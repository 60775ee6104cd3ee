/// Parameter resolution and `{{key}}` substitution for playbooks

use crate::error::{Error, Result};
use crate::playbook::types::PlaybookParameter;
use crate::runtime::runner::stringify_output;
use crate::workflow::types::{StepAction, WorkflowStep};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Maximum characters kept in a run's `outputSummary`
pub const OUTPUT_SUMMARY_CHARS: usize = 500;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Validate supplied values against the schema and fill in defaults
///
/// Supplied non-null values win, then defaults. Required parameters that end up
/// without a value are reported together. Keys outside the schema pass through.
pub fn resolve_parameters(
    schema: &[PlaybookParameter],
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    let mut missing = Vec::new();
    let mut type_errors = Vec::new();

    for param in schema {
        match supplied.get(&param.key).filter(|v| !v.is_null()) {
            Some(value) => {
                if !param.kind.accepts(value) {
                    type_errors.push(format!("'{}' must be a {}", param.key, param.kind.as_str()));
                }
                resolved.insert(param.key.clone(), value.clone());
            }
            None => match param.default.as_ref().filter(|v| !v.is_null()) {
                Some(default) => {
                    resolved.insert(param.key.clone(), default.clone());
                }
                None if param.required => missing.push(param.key.clone()),
                None => {}
            },
        }
    }

    if !missing.is_empty() {
        return Err(Error::MissingParameters(missing));
    }
    if !type_errors.is_empty() {
        return Err(Error::Validation(format!(
            "Invalid parameter values: {}",
            type_errors.join("; ")
        )));
    }

    for (key, value) in supplied {
        if !resolved.contains_key(key) && !value.is_null() {
            resolved.insert(key.clone(), value.clone());
        }
    }

    Ok(resolved)
}

/// Replace `{{key}}` tokens with parameter values; unknown keys stay verbatim
pub fn render_template(template: &str, values: &Map<String, Value>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| match values.get(caps[1].trim()) {
            Some(value) => stringify_output(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Apply substitution to every string-valued field of a step list
pub fn render_steps(steps: &[WorkflowStep], values: &Map<String, Value>) -> Vec<WorkflowStep> {
    steps
        .iter()
        .map(|step| WorkflowStep {
            id: step.id.clone(),
            label: render_template(&step.label, values),
            action: match &step.action {
                StepAction::AgentPrompt { prompt } => StepAction::AgentPrompt {
                    prompt: render_template(prompt, values),
                },
                StepAction::ToolCall { tool_name, input } => StepAction::ToolCall {
                    tool_name: render_template(tool_name, values),
                    input: render_value(input, values),
                },
                StepAction::Delay { delay_ms } => StepAction::Delay { delay_ms: *delay_ms },
            },
        })
        .collect()
}

fn render_value(value: &Value, values: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render_template(s, values)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, values)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, values)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Cut `text` to `max_chars` characters, marking the cut with an ellipsis
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::types::ParameterKind;
    use serde_json::json;

    fn param(key: &str, required: bool, default: Option<Value>) -> PlaybookParameter {
        PlaybookParameter {
            key: key.to_string(),
            label: String::new(),
            description: String::new(),
            kind: ParameterKind::String,
            required,
            default,
        }
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_fill_omitted_parameters() {
        let schema = vec![
            param("topic", true, None),
            param("audience", false, Some(json!("product team"))),
        ];
        let resolved = resolve_parameters(&schema, &map(json!({ "topic": "pricing" }))).unwrap();
        assert_eq!(resolved["topic"], json!("pricing"));
        assert_eq!(resolved["audience"], json!("product team"));

        let prompt = render_template("Write about {{topic}} for {{ audience }}.", &resolved);
        assert_eq!(prompt, "Write about pricing for product team.");
    }

    #[test]
    fn missing_required_parameters_are_all_listed() {
        let schema = vec![
            param("topic", true, None),
            param("tone", true, None),
            param("length", false, None),
        ];
        let err = resolve_parameters(&schema, &map(json!({ "tone": null }))).unwrap_err();
        match err {
            Error::MissingParameters(keys) => assert_eq!(keys, vec!["topic", "tone"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn required_parameter_with_default_is_satisfied() {
        let schema = vec![param("region", true, Some(json!("eu")))];
        let resolved = resolve_parameters(&schema, &Map::new()).unwrap();
        assert_eq!(resolved["region"], json!("eu"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut count = param("count", false, None);
        count.kind = ParameterKind::Number;
        let err = resolve_parameters(&[count], &map(json!({ "count": "three" }))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn extra_supplied_keys_pass_through() {
        let resolved = resolve_parameters(&[], &map(json!({ "extra": 1 }))).unwrap();
        assert_eq!(resolved["extra"], json!(1));
    }

    #[test]
    fn pass_through_keys_of_any_shape_are_substituted() {
        let resolved = resolve_parameters(
            &[],
            &map(json!({ "first name": "Ada", "städte": "Köln" })),
        )
        .unwrap();
        assert_eq!(
            render_template("Hi {{first name}} from {{ städte }}", &resolved),
            "Hi Ada from Köln"
        );
        assert_eq!(render_template("{{ }} and {{last name}}", &resolved), "{{ }} and {{last name}}");
    }

    #[test]
    fn unmatched_tokens_stay_verbatim() {
        let values = map(json!({ "n": 3, "flag": true }));
        assert_eq!(
            render_template("{{n}} items, {{flag}}, {{unknown}}, {n}", &values),
            "3 items, true, {{unknown}}, {n}"
        );
    }

    #[test]
    fn rendered_steps_contain_no_supplied_tokens() {
        let steps: Vec<WorkflowStep> = serde_json::from_value(json!([
            { "id": "a", "label": "Research {{topic}}", "type": "agent_prompt",
              "prompt": "Find facts on {{topic}} for {{audience}}" },
            { "id": "b", "label": "Store", "type": "tool_call", "toolName": "{{tool}}",
              "input": { "title": "{{topic}}", "tags": ["{{audience}}", 7], "nested": { "x": "{{topic}}!" } } },
            { "id": "c", "type": "delay", "delayMs": 5 }
        ]))
        .unwrap();
        let values = map(json!({ "topic": "rust", "audience": "devs", "tool": "echo" }));

        let rendered = render_steps(&steps, &values);
        let text = serde_json::to_string(&rendered).unwrap();
        for key in ["topic", "audience", "tool"] {
            assert!(!text.contains(&format!("{{{{{}}}}}", key)), "token {} left in {}", key, text);
        }
        assert_eq!(rendered[0].label, "Research rust");
        assert_eq!(
            rendered[1].action,
            StepAction::ToolCall {
                tool_name: "echo".to_string(),
                input: json!({ "title": "rust", "tags": ["devs", 7], "nested": { "x": "rust!" } }),
            }
        );
        assert_eq!(rendered[2].action, StepAction::Delay { delay_ms: 5 });
    }

    #[test]
    fn truncation_marks_cut_text() {
        assert_eq!(truncate_summary("short", 10), "short");
        assert_eq!(truncate_summary("abcdef", 3), "abc…");
        assert_eq!(truncate_summary("héllo wörld", 5), "héllo…");
    }
}
