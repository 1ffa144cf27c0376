use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("upstream response contains no choices")]
pub struct MalformedResponse;

pub fn message_content(body: &Value) -> Result<Option<String>, MalformedResponse> {
    let first = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(MalformedResponse)?;

    Ok(first
        .pointer("/message/content")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string))
}

pub fn translation_text(
    body: &Value,
    reasoning_fallback: bool,
) -> Result<Option<String>, MalformedResponse> {
    if let Some(text) = message_content(body)? {
        return Ok(Some(text));
    }
    if !reasoning_fallback {
        return Ok(None);
    }
    Ok(reasoning::recover(body))
}

/// Degraded mode for reasoning models that leave `content` empty and only
/// mention the answer inside `reasoning` as `English: "..."` fragments.
pub mod reasoning {
    use regex::Regex;
    use serde_json::Value;
    use std::sync::OnceLock;
    use tracing::info;

    fn pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(r#"English:\s*"([^"]+)""#).expect("valid regex"))
    }

    pub fn recover(body: &Value) -> Option<String> {
        let reasoning = body.pointer("/choices/0/message/reasoning")?.as_str()?;
        let text = scrape(reasoning)?;
        info!("recovered translation from reasoning field");
        Some(text)
    }

    pub fn scrape(reasoning: &str) -> Option<String> {
        let bullets: Vec<String> = pattern()
            .captures_iter(reasoning)
            .map(|caps| format!("• {}", &caps[1]))
            .collect();
        if bullets.is_empty() {
            None
        } else {
            Some(bullets.join("\n"))
        }
    }
}
