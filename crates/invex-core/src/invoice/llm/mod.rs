//! LLM-backed field extraction.
//!
//! The raw document text is sent to the configured provider together with
//! an explicit JSON schema. The reply must be a single object with an
//! `invoice_data` object and a `line_items` array. An unparseable reply
//! earns one clarifying follow-up turn before the extractor gives up.

mod provider;
mod transport;

pub use provider::{Credentials, Provider, UnknownProvider};
pub use transport::{ChatRequest, ChatTransport, HttpTransport, Role, Turn};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::FieldExtractor;
use crate::error::LlmError;
use crate::models::config::LlmConfig;
use crate::models::invoice::{ExtractionMethod, InvoiceField, LineItemField, RawExtraction};

const SYSTEM_PROMPT: &str = "You are an expert at extracting structured data from invoice documents. \
Read the document text carefully and return only a single valid JSON object, \
with no markdown fences and no commentary. Use null for anything you cannot find.";

/// Field extractor backed by a remote LLM.
pub struct LlmFieldExtractor {
    provider: Provider,
    config: LlmConfig,
    transport: Arc<dyn ChatTransport>,
}

impl LlmFieldExtractor {
    /// Create an extractor that talks to the provider over HTTP.
    pub fn new(provider: Provider, config: LlmConfig) -> Result<Self, LlmError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(provider, config, Arc::new(transport)))
    }

    /// Create an extractor over a custom transport.
    pub fn with_transport(provider: Provider, config: LlmConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            provider,
            config,
            transport,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Build the user prompt, truncating the document to the provider's budget.
    pub fn build_prompt(&self, text: &str) -> String {
        let max_chars = self.config.max_chars(self.provider);
        let truncated: String = text.chars().take(max_chars).collect();
        if truncated.len() < text.len() {
            debug!(max_chars, original_chars = text.chars().count(), "truncated document text for prompt");
        }

        let invoice_keys: Vec<String> = InvoiceField::ALL
            .iter()
            .map(|f| format!("    \"{}\": \"string or null\"", f.label()))
            .collect();
        let item_keys: Vec<String> = LineItemField::ALL
            .iter()
            .map(|f| format!("      \"{}\": \"string or null\"", f.label()))
            .collect();

        format!(
            "Extract the invoice header and every line item from the document below.\n\
             Respond with one JSON object of exactly this shape:\n\
             {{\n  \"invoice_data\": {{\n{}\n  }},\n  \"line_items\": [\n    {{\n{}\n    }}\n  ]\n}}\n\
             Dates should be copied as printed. Amounts should be copied as printed, without currency symbols.\n\n\
             Document text:\n{}",
            invoice_keys.join(",\n"),
            item_keys.join(",\n"),
            truncated
        )
    }

    async fn complete(&self, turns: &[Turn], credentials: &Credentials) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model(self.provider),
            system: SYSTEM_PROMPT,
            turns,
            max_output_tokens: self.config.max_output_tokens,
        };

        let timeout = self.config.timeout();
        tokio::time::timeout(timeout, self.transport.complete(&request, credentials))
            .await
            .map_err(|_| LlmError::Unavailable(format!("no response within {}s", timeout.as_secs())))?
    }
}

#[async_trait]
impl FieldExtractor for LlmFieldExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Llm(self.provider)
    }

    async fn extract_fields(&self, text: &str, credentials: Option<&Credentials>) -> Result<RawExtraction, LlmError> {
        let credentials = credentials
            .filter(|c| c.provider == self.provider)
            .ok_or_else(|| LlmError::Unavailable(format!("no credentials for {}", self.provider)))?;

        let retries = u32::from(self.config.max_retries.min(1));
        let mut turns = vec![Turn::user(self.build_prompt(text))];
        let mut attempt = 0;

        loop {
            attempt += 1;
            let reply = self.complete(&turns, credentials).await?;

            match parse_response(&reply) {
                Ok(raw) => {
                    info!(provider = %self.provider, attempt, fields = raw.field_count(), "LLM extraction succeeded");
                    return Ok(raw);
                }
                Err(err) if attempt <= retries => {
                    warn!(provider = %self.provider, error = %err, "unusable LLM response, asking for a correction");
                    turns.push(Turn::assistant(reply));
                    turns.push(Turn::user(format!(
                        "Your previous reply could not be used: {err}. \
                         Reply again with only the JSON object containing \"invoice_data\" and \"line_items\"."
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Parse a model reply into a raw field mapping.
pub fn parse_response(reply: &str) -> Result<RawExtraction, LlmError> {
    // Strip markdown fences if the model added them despite instructions
    let stripped = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = extract_json_object(stripped)?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| LlmError::ResponseInvalid(format!("invalid JSON: {e}")))?;

    let invoice_data = value
        .get("invoice_data")
        .and_then(Value::as_object)
        .ok_or_else(|| LlmError::ResponseInvalid("missing object 'invoice_data'".to_string()))?;
    let line_items = value
        .get("line_items")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::ResponseInvalid("missing array 'line_items'".to_string()))?;

    let mut raw = RawExtraction {
        invoice: collect_fields(invoice_data, InvoiceField::from_label),
        line_items: Vec::with_capacity(line_items.len()),
    };

    for item in line_items {
        let Some(object) = item.as_object() else {
            warn!("skipping non-object line item in LLM response");
            continue;
        };
        let fields = collect_fields(object, LineItemField::from_label);
        if !fields.is_empty() {
            raw.line_items.push(fields);
        }
    }

    Ok(raw)
}

/// Extract the outermost JSON object from a reply that may contain
/// surrounding prose.
fn extract_json_object(s: &str) -> Result<&str, LlmError> {
    let start = s
        .find('{')
        .ok_or_else(|| LlmError::ResponseInvalid("no '{' found in response".to_string()))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| LlmError::ResponseInvalid("no '}' found in response".to_string()))?;
    if end <= start {
        return Err(LlmError::ResponseInvalid("malformed JSON object in response".to_string()));
    }
    Ok(&s[start..=end])
}

fn collect_fields<K: Ord>(object: &Map<String, Value>, resolve: fn(&str) -> Option<K>) -> BTreeMap<K, String> {
    object
        .iter()
        .filter_map(|(key, value)| {
            let Some(field) = resolve(key) else {
                debug!(key = %key, "ignoring unknown key in LLM response");
                return None;
            };
            json_to_string(value).map(|s| (field, s))
        })
        .collect()
}

/// Render a JSON scalar as the raw field string. Nulls and blanks are absent.
fn json_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("Yes".to_string()),
        Value::Bool(false) => Some("No".to_string()),
        other => Some(other.to_string()),
    }
}
