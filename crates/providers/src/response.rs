//! Response-shape tolerance for the inference API.
//!
//! Depending on the model's pipeline the API answers with a list of
//! objects, a single object, a bare string, or an OpenAI-style
//! `choices` array. Anything else is serialized and truncated so the
//! caller still gets text back.

use pr_domain::error::{Error, Result};
use serde_json::Value;

use crate::util::truncate_chars;

/// Fields that carry generated text, in lookup order.
pub const GENERATION_FIELDS: &[&str] = &["generated_text", "summary_text", "translation_text"];

/// Fields that carry a transcript.
pub const TRANSCRIPT_FIELDS: &[&str] = &["text"];

/// Cap applied to the serialized last-resort fallback.
pub const RAW_FALLBACK_MAX_CHARS: usize = 2000;

/// Pull the text out of a successful response body.
///
/// An object carrying an `error` key is reported as a provider error even
/// when the status was 2xx.
pub fn extract_text(provider: &str, body: &Value, fields: &[&str]) -> Result<String> {
    if let Some(err) = body.get("error") {
        let message = err
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return Err(Error::Provider {
            provider: provider.to_string(),
            message,
        });
    }

    if let Some(text) = known_shape(body, fields) {
        return Ok(text);
    }

    tracing::debug!(provider, "unrecognized response shape, returning raw body");
    Ok(truncate_chars(&body.to_string(), RAW_FALLBACK_MAX_CHARS))
}

fn known_shape(body: &Value, fields: &[&str]) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|first| field_text(first, fields)),
        Value::Object(_) => field_text(body, fields).or_else(|| chat_completion_text(body)),
        _ => None,
    }
}

fn field_text(obj: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| obj.get(*f).and_then(|v| v.as_str()))
        .map(String::from)
}

fn chat_completion_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gen(body: Value) -> Result<String> {
        extract_text("hf", &body, GENERATION_FIELDS)
    }

    #[test]
    fn list_of_objects() {
        let out = gen(json!([{"generated_text": "I can only show you the door."}])).unwrap();
        assert_eq!(out, "I can only show you the door.");
    }

    #[test]
    fn single_object() {
        assert_eq!(gen(json!({"generated_text": "free your mind"})).unwrap(), "free your mind");
    }

    #[test]
    fn bare_string() {
        assert_eq!(gen(json!("there is no spoon")).unwrap(), "there is no spoon");
    }

    #[test]
    fn summarization_pipeline_field() {
        let out = gen(json!([{"summary_text": "The user asked about the Matrix."}])).unwrap();
        assert_eq!(out, "The user asked about the Matrix.");
    }

    #[test]
    fn chat_completion_shape() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Welcome to the real world."}}]
        });
        assert_eq!(gen(body).unwrap(), "Welcome to the real world.");
    }

    #[test]
    fn transcript_field() {
        let out = extract_text("hf", &json!({"text": "hello neo"}), TRANSCRIPT_FIELDS).unwrap();
        assert_eq!(out, "hello neo");
    }

    #[test]
    fn unknown_shape_is_serialized_and_truncated() {
        let long = "x".repeat(5000);
        let out = gen(json!({"unexpected": long})).unwrap();
        assert_eq!(out.chars().count(), RAW_FALLBACK_MAX_CHARS);
        assert!(out.starts_with("{\"unexpected\":"));
    }

    #[test]
    fn empty_list_falls_back_to_raw() {
        assert_eq!(gen(json!([])).unwrap(), "[]");
    }

    #[test]
    fn error_body_is_provider_error() {
        let err = gen(json!({"error": "Model is currently loading"})).unwrap_err();
        assert!(matches!(err, Error::Provider { ref message, .. } if message.contains("loading")));
    }
}
