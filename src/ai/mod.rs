use crate::config::{API_KEY_ENV, Config};
use crate::reporting::prompt::REPORTING_SYSTEM_PROMPT;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AiInsights {
    pub summary: String,
    pub insights: Vec<String>,
}

pub fn is_configured(config: &Config) -> bool {
    config.resolve_api_key().is_some()
}

/// Generates the summary and insight list for one worker prompt.
///
/// Without an API key this returns a fixed sentinel result and performs no
/// network call. With a key, one request is made against the configured
/// responses endpoint under a strict JSON output schema; there are no
/// retries here, a failed call surfaces to the caller.
pub fn request_insights(config: &Config, prompt: &str) -> Result<AiInsights> {
    let Some(api_key) = config.resolve_api_key() else {
        return Ok(unconfigured_fallback());
    };

    let payload = responses_call(config, &api_key, REPORTING_SYSTEM_PROMPT, prompt)?;
    parse_insights_payload(&payload)
}

pub fn test_connection(config: &Config) -> Result<String> {
    config.resolve_api_key().context(
        "AI API key is missing. Set `worktracker config set ai.api_key <KEY>` or WORKTRACKER_AI_API_KEY.",
    )?;

    let probe = request_insights(
        config,
        "Connectivity check. Reply with a one-sentence summary and an empty insight focus.",
    )?;

    Ok(probe.summary)
}

fn unconfigured_fallback() -> AiInsights {
    AiInsights {
        summary: format!(
            "AI reporting is not configured. Provide {API_KEY_ENV} to enable automated reports."
        ),
        insights: vec![
            "No insights generated because the AI provider credentials are missing.".to_string(),
        ],
    }
}

fn responses_call(config: &Config, api_key: &str, system: &str, user: &str) -> Result<Value> {
    let endpoint = config.ai_endpoint.clone();
    let model = config.ai_model.clone();
    let timeout_seconds = config.ai_timeout_seconds.max(5);
    let api_key = api_key.to_string();
    let system = system.to_string();
    let user = user.to_string();

    std::thread::spawn(move || {
        responses_call_blocking(&endpoint, &model, timeout_seconds, &api_key, &system, &user)
    })
    .join()
    .map_err(|_| anyhow!("AI worker thread panicked"))?
}

fn responses_call_blocking(
    endpoint: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    system: &str,
    user: &str,
) -> Result<Value> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": model,
        "input": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "worker_daily_report",
                "schema": {
                    "type": "object",
                    "properties": {
                        "summary": {"type": "string"},
                        "insights": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["summary", "insights"],
                    "additionalProperties": false
                }
            }
        }
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, body);
    }

    serde_json::from_str(&body).with_context(|| format!("AI response is not JSON: {body}"))
}

/// The responses endpoint has been observed to wrap its output in three
/// envelope shapes; each is tried in order and the embedded text is parsed
/// against the requested schema, degrading to raw-text-as-summary when the
/// text is not the expected JSON. Anything else is a contract violation.
fn parse_insights_payload(payload: &Value) -> Result<AiInsights> {
    if let Some(item) = payload.pointer("/output/0/content/0") {
        let item_type = item.get("type").and_then(Value::as_str);
        let text = item.get("text").and_then(Value::as_str);

        match (item_type, text) {
            (Some("output_text"), Some(text)) => {
                return Ok(parse_schema_text(text).unwrap_or_else(|| raw_text_insights(text)));
            }
            (Some("text"), Some(text)) => return Ok(parse_loose_text(text)),
            _ => {}
        }
    }

    if let Some(text) = payload
        .pointer("/response/output/0/content/0/text")
        .and_then(Value::as_str)
    {
        return Ok(parse_loose_text(text));
    }

    bail!("Unexpected AI response structure")
}

/// Strict read: the text must be a JSON object with a string `summary` and
/// a string-array `insights`.
fn parse_schema_text(text: &str) -> Option<AiInsights> {
    let parsed: Value = serde_json::from_str(text).ok()?;
    let summary = parsed.get("summary")?.as_str()?.to_string();
    let insights = string_array(parsed.get("insights")?)?;

    Some(AiInsights { summary, insights })
}

/// Loose read: missing fields fall back to the raw text and an empty list.
fn parse_loose_text(text: &str) -> AiInsights {
    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return raw_text_insights(text);
    };

    let summary = parsed
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or(text)
        .to_string();
    let insights = parsed
        .get("insights")
        .and_then(string_array)
        .unwrap_or_default();

    AiInsights { summary, insights }
}

fn raw_text_insights(text: &str) -> AiInsights {
    AiInsights {
        summary: text.to_string(),
        insights: Vec::new(),
    }
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect()
    })
}
