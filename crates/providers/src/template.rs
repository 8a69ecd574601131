//! `$name` placeholder substitution for custom-API request templates.
//!
//! Templates are JSON-shaped strings in which placeholders may appear bare
//! (`$model`), double-quoted (`"$messages"`), or single-quoted
//! (`'$messages'`).  Composite values (objects/arrays) always splice their
//! compact JSON serialization with the surrounding quotes removed; keeping
//! the quotes would double-encode the value.  Scalars substitute their
//! literal string form with the template's quoting preserved.
//!
//! A documented quirk, preserved deliberately: `"$messages"` splices raw
//! JSON for composite values even if the template author meant a literal
//! string.  There is no escape hatch.

use serde_json::{Map, Value};

/// Substitute `vars` into `template`.
///
/// Placeholders with no provided value are left untouched.  This function
/// never fails; callers detect bad output by attempting to parse the
/// result as JSON.  Matching uses exact token boundaries, so `$model`
/// never matches inside `$modelName`.
pub fn resolve(template: &str, vars: &Map<String, Value>) -> String {
    let mut result = template.to_string();

    for (name, value) in vars {
        let escaped = regex::escape(name);
        // Quoted forms first so the quotes are consumed together with the
        // placeholder; `\b` keeps the bare form from matching a prefix of a
        // longer name.
        let pattern = format!(r#""\${escaped}"|'\${escaped}'|\${escaped}\b"#);
        let re = match regex::Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };

        let composite = matches!(value, Value::Object(_) | Value::Array(_));
        let rendered = match value {
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string(value).unwrap_or_default()
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        // Closure replacement: substituted values may themselves contain
        // `$`, which the string-replacement syntax would reinterpret.
        result = re
            .replace_all(&result, |caps: &regex::Captures| {
                let matched = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                if composite {
                    rendered.clone()
                } else if matched.starts_with('"') {
                    format!("\"{rendered}\"")
                } else if matched.starts_with('\'') {
                    format!("'{rendered}'")
                } else {
                    rendered.clone()
                }
            })
            .into_owned();
    }

    result
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn scalar_into_quoted_placeholder() {
        let v = vars(&[("model", json!("gpt-4o"))]);
        let out = resolve(r#"{"model": "$model"}"#, &v);
        assert_eq!(out, r#"{"model": "gpt-4o"}"#);
        serde_json::from_str::<Value>(&out).unwrap();
    }

    #[test]
    fn scalar_inside_larger_string() {
        let v = vars(&[("apiKey", json!("sk-123"))]);
        let out = resolve(r#"{"Authorization": "Bearer $apiKey"}"#, &v);
        assert_eq!(out, r#"{"Authorization": "Bearer sk-123"}"#);
    }

    #[test]
    fn composite_collapses_all_quoting_forms() {
        let messages = json!([{"role": "user", "content": "hi"}]);
        let expected = json!({"m": [{"role": "user", "content": "hi"}]});

        for template in [r#"{"m": $messages}"#, r#"{"m": "$messages"}"#, r#"{"m": '$messages'}"#] {
            let v = vars(&[("messages", messages.clone())]);
            let out = resolve(template, &v);
            let parsed: Value = serde_json::from_str(&out)
                .unwrap_or_else(|e| panic!("template {template} gave invalid JSON ({e}): {out}"));
            assert_eq!(parsed, expected, "template: {template}");
        }
    }

    #[test]
    fn chat_completion_body_resolves() {
        let v = vars(&[
            ("model", json!("m1")),
            ("messages", json!([{"role": "user", "content": "hi"}])),
        ]);
        let out = resolve(r#"{"model":"$model","messages":$messages}"#, &v);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            json!({"model": "m1", "messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn placeholder_names_do_not_cross_contaminate() {
        let v = vars(&[("model", json!("a")), ("modelName", json!("b"))]);
        let out = resolve(r#"{"x": "$model", "y": "$modelName"}"#, &v);
        assert_eq!(out, r#"{"x": "a", "y": "b"}"#);
    }

    #[test]
    fn missing_variable_left_untouched() {
        let v = vars(&[("model", json!("m1"))]);
        let out = resolve(r#"{"model": "$model", "key": "$apiKey"}"#, &v);
        assert_eq!(out, r#"{"model": "m1", "key": "$apiKey"}"#);
    }

    #[test]
    fn resolved_output_is_stable_under_re_resolution() {
        let v = vars(&[("model", json!("m1"))]);
        let once = resolve(r#"{"model": "$model"}"#, &v);
        let twice = resolve(&once, &v);
        assert_eq!(once, twice);
    }

    #[test]
    fn value_containing_dollar_sign_is_literal() {
        let v = vars(&[("prompt", json!("costs $5 ($currency)"))]);
        let out = resolve(r#"{"p": "$prompt"}"#, &v);
        assert_eq!(out, r#"{"p": "costs $5 ($currency)"}"#);
    }

    #[test]
    fn number_and_bool_scalars() {
        let v = vars(&[("temp", json!(0.5)), ("stream", json!(false))]);
        let out = resolve(r#"{"temperature": $temp, "stream": $stream}"#, &v);
        assert_eq!(out, r#"{"temperature": 0.5, "stream": false}"#);
    }

    #[test]
    fn regex_metacharacters_in_name_are_escaped() {
        let v = vars(&[("a.b", json!("x"))]);
        let out = resolve("$a.b and $acb", &v);
        assert_eq!(out, "x and $acb");
    }
}
