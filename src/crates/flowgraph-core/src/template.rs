//! Template interpolation and condition evaluation
//!
//! Interpolation replaces `{{name}}` tokens with the formatted value of
//! the named variable. Tokens that resolve to nothing are left literal,
//! so interpolation is total and never fails. Resolution tries an exact
//! variable first, then a set of semantic aliases (`result` for the most
//! recent AI output, `items` for loop results, `last` for the pipeline
//! value), then a case-insensitive substring match over variable names.
//!
//! Condition evaluation interpolates first, then scans for one of
//! `>=`, `<=`, `==`, `!=`, `>`, `<` (first found wins), comparing
//! numerically when both sides parse as numbers and falling back to
//! string equality for `==`/`!=` only.

use serde_json::Value;
use std::collections::HashMap;

/// Aliases that resolve to the most recent `ai_*` variable
const AI_OUTPUT_ALIASES: [&str; 6] = [
    "analysis", "result", "response", "answer", "output", "content",
];

/// Aliases that resolve to loop results
const LOOP_ALIASES: [&str; 5] = ["variations", "items", "results", "list", "array"];

/// Aliases that resolve to the current pipeline value
const LAST_VALUE_ALIASES: [&str; 3] = ["last", "previous", "current"];

/// Replace every `{{name}}` token with the formatted variable value
///
/// Unresolvable tokens remain literal in the output.
pub(crate) fn interpolate(variables: &HashMap<String, Value>, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match parse_token(after_open) {
            Some((name, consumed)) => {
                match resolve(variables, name) {
                    Some(value) => out.push_str(&format_value(value)),
                    None => {
                        // Leave the token untouched
                        out.push_str("{{");
                        out.push_str(&after_open[..consumed]);
                    }
                }
                rest = &after_open[consumed..];
            }
            None => {
                out.push_str("{{");
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse a `name}}` prefix; returns the name and bytes consumed (incl. `}}`)
fn parse_token(input: &str) -> Option<(&str, usize)> {
    let end = input.find("}}")?;
    let name = &input[..end];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, end + 2))
}

/// Resolve a variable name: exact match, semantic aliases, partial match
fn resolve<'a>(variables: &'a HashMap<String, Value>, name: &str) -> Option<&'a Value> {
    if let Some(value) = variables.get(name) {
        return Some(value);
    }

    let lower = name.to_lowercase();
    if AI_OUTPUT_ALIASES.contains(&lower.as_str()) {
        if let Some(value) = most_recent_with_prefix(variables, "ai_") {
            return Some(value);
        }
    }
    if LOOP_ALIASES.contains(&lower.as_str()) {
        if let Some(value) = variables.get("loopResults") {
            return Some(value);
        }
        if let Some(value) = most_recent_with_prefix(variables, "loop_") {
            return Some(value);
        }
    }
    if LAST_VALUE_ALIASES.contains(&lower.as_str()) {
        if let Some(value) = variables.get("lastValue") {
            return Some(value);
        }
    }

    partial_match(variables, &lower)
}

/// Most recent `<prefix><node-id>` variable, assuming higher ids are newer
fn most_recent_with_prefix<'a>(
    variables: &'a HashMap<String, Value>,
    prefix: &str,
) -> Option<&'a Value> {
    variables
        .iter()
        .filter(|(key, _)| key.starts_with(prefix))
        .max_by_key(|(key, _)| {
            key[prefix.len()..]
                .split('_')
                .next()
                .and_then(|id| id.parse::<u64>().ok())
                .unwrap_or(0)
        })
        .map(|(_, value)| value)
}

/// Case-insensitive substring match over variable names
fn partial_match<'a>(variables: &'a HashMap<String, Value>, lower: &str) -> Option<&'a Value> {
    variables
        .iter()
        .find(|(key, _)| key.to_lowercase().contains(lower))
        .map(|(_, value)| value)
}

/// Format a value for embedding into prompts and conditions
///
/// Arrays of scalars render as a numbered list separated by `---` rules,
/// other arrays and objects as pretty JSON, scalars via their display form.
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            let all_scalar = items
                .iter()
                .all(|item| matches!(item, Value::String(_) | Value::Number(_)));
            if all_scalar {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}. {}", i + 1, format_value(item)))
                    .collect::<Vec<_>>()
                    .join("\n\n---\n\n")
            } else {
                serde_json::to_string_pretty(value).unwrap_or_default()
            }
        }
        Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Comparison operators, in scan precedence order
const OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

/// Evaluate an already-interpolated condition string
///
/// Returns `Err` with a reason when the expression cannot be evaluated;
/// the caller logs it and treats the condition as false.
pub(crate) fn evaluate_condition(interpolated: &str) -> Result<bool, String> {
    for op in OPERATORS {
        if let Some(pos) = interpolated.find(op) {
            let left = interpolated[..pos].trim();
            let right = interpolated[pos + op.len()..].trim();

            if let (Ok(a), Ok(b)) = (left.parse::<f64>(), right.parse::<f64>()) {
                return Ok(match op {
                    ">=" => a >= b,
                    "<=" => a <= b,
                    "==" => a == b,
                    "!=" => a != b,
                    ">" => a > b,
                    _ => a < b,
                });
            }

            return match op {
                "==" => Ok(left == right),
                "!=" => Ok(left != right),
                _ => Err(format!(
                    "operator '{}' requires numeric operands: '{}'",
                    op, interpolated
                )),
            };
        }
    }

    match interpolated.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(format!("not a recognizable condition: '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_interpolate_set_variable() {
        let v = vars(&[("x", json!(5))]);
        assert_eq!(interpolate(&v, "{{x}}"), "5");
        assert_eq!(interpolate(&v, "value is {{x}}!"), "value is 5!");
    }

    #[test]
    fn test_interpolate_missing_stays_literal() {
        let v = vars(&[]);
        assert_eq!(interpolate(&v, "{{missing}}"), "{{missing}}");
        assert_eq!(interpolate(&v, "a {{missing}} b"), "a {{missing}} b");
    }

    #[test]
    fn test_interpolate_malformed_tokens() {
        let v = vars(&[("x", json!(1))]);
        assert_eq!(interpolate(&v, "{{"), "{{");
        assert_eq!(interpolate(&v, "{{not closed"), "{{not closed");
        assert_eq!(interpolate(&v, "{{bad name}}"), "{{bad name}}");
        assert_eq!(interpolate(&v, "{{}}"), "{{}}");
    }

    #[test]
    fn test_interpolate_multiple_tokens() {
        let v = vars(&[("a", json!("x")), ("b", json!("y"))]);
        assert_eq!(interpolate(&v, "{{a}}-{{b}}-{{a}}"), "x-y-x");
    }

    #[test]
    fn test_semantic_alias_ai_output() {
        let v = vars(&[("ai_2", json!("newer")), ("ai_1", json!("older"))]);
        assert_eq!(interpolate(&v, "{{result}}"), "newer");
        assert_eq!(interpolate(&v, "{{answer}}"), "newer");
    }

    #[test]
    fn test_semantic_alias_loop_results() {
        let v = vars(&[("loopResults", json!(["a", "b"]))]);
        assert_eq!(interpolate(&v, "{{items}}"), "1. a\n\n---\n\n2. b");
    }

    #[test]
    fn test_semantic_alias_last_value() {
        let v = vars(&[("lastValue", json!("current value"))]);
        assert_eq!(interpolate(&v, "{{last}}"), "current value");
    }

    #[test]
    fn test_partial_match() {
        let v = vars(&[("input_node1", json!("partial"))]);
        assert_eq!(interpolate(&v, "{{node1}}"), "partial");
    }

    #[test]
    fn test_format_value_scalar_array_numbered_list() {
        let value = json!(["first", "second", 3]);
        assert_eq!(
            format_value(&value),
            "1. first\n\n---\n\n2. second\n\n---\n\n3. 3"
        );
        assert_eq!(format_value(&json!([])), "[]");
    }

    #[test]
    fn test_format_value_object_pretty_json() {
        let value = json!({"a": 1});
        assert_eq!(format_value(&value), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_evaluate_numeric_comparisons() {
        assert_eq!(evaluate_condition("5 > 3"), Ok(true));
        assert_eq!(evaluate_condition("5 < 3"), Ok(false));
        assert_eq!(evaluate_condition("5 >= 5"), Ok(true));
        assert_eq!(evaluate_condition("4 <= 3"), Ok(false));
        assert_eq!(evaluate_condition("2 == 2.0"), Ok(true));
        assert_eq!(evaluate_condition("2 != 2"), Ok(false));
    }

    #[test]
    fn test_evaluate_string_equality() {
        assert_eq!(evaluate_condition("x == x"), Ok(true));
        assert_eq!(evaluate_condition("x != y"), Ok(true));
        assert_eq!(evaluate_condition("x == y"), Ok(false));
    }

    #[test]
    fn test_evaluate_ordering_on_strings_fails() {
        assert!(evaluate_condition("abc > def").is_err());
    }

    #[test]
    fn test_evaluate_bare_booleans() {
        assert_eq!(evaluate_condition("true"), Ok(true));
        assert_eq!(evaluate_condition("1"), Ok(true));
        assert_eq!(evaluate_condition("false"), Ok(false));
        assert_eq!(evaluate_condition("0"), Ok(false));
        assert_eq!(evaluate_condition(""), Ok(false));
    }

    #[test]
    fn test_evaluate_unrecognized_is_error() {
        assert!(evaluate_condition("not-an-expr").is_err());
    }

    #[test]
    fn test_operator_precedence_first_found_wins() {
        // ">=" is scanned before ">", so "5 >= 5" is not split on ">"
        assert_eq!(evaluate_condition("5 >= 5"), Ok(true));
        // "!=" before "<": "a != b" with non-numeric sides is inequality
        assert_eq!(evaluate_condition("a != b"), Ok(true));
    }
}
