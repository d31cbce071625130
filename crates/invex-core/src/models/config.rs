//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{InvexError, Result};
use crate::invoice::llm::Provider;

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// LLM extraction configuration.
    pub llm: LlmConfig,

    /// Rule-based extraction configuration.
    pub extraction: ExtractionConfig,

    /// CSV output configuration.
    pub output: OutputConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum non-whitespace characters from the text layer before OCR is tried.
    pub min_text_chars: usize,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 100,
            max_pages: 0,
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Enable the OCR fallback for scanned documents.
    pub enabled: bool,

    /// Directory containing `det.onnx`, `latin_rec.onnx` and `latin_dict.txt`.
    pub model_dir: PathBuf,

    /// Keep `[UNK]` tokens in recognized text instead of replacing them with spaces.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_dir: PathBuf::from("models"),
            keep_unk: false,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Default provider when none is given on the command line.
    pub provider: Provider,

    /// Gemini model name.
    pub google_model: String,

    /// OpenAI model name.
    pub openai_model: String,

    /// Gemini REST base URL.
    pub google_base_url: String,

    /// OpenAI REST base URL.
    pub openai_base_url: String,

    /// Upper bound for one provider round trip, in seconds.
    pub timeout_secs: u64,

    /// Clarifying retries after an unparseable response (0 or 1).
    pub max_retries: u8,

    /// Prompt text budget for Gemini.
    pub google_max_chars: usize,

    /// Prompt text budget for OpenAI.
    pub openai_max_chars: usize,

    /// Maximum tokens requested from the model.
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Google,
            google_model: "gemini-1.0-pro".to_string(),
            openai_model: "gpt-4".to_string(),
            google_base_url: "https://generativelanguage.googleapis.com/v1".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            max_retries: 1,
            google_max_chars: 10_000,
            openai_max_chars: 8_000,
            max_output_tokens: 4_000,
        }
    }
}

impl LlmConfig {
    /// Model name for a provider.
    pub fn model(&self, provider: Provider) -> &str {
        match provider {
            Provider::Google => &self.google_model,
            Provider::OpenAi => &self.openai_model,
        }
    }

    /// Base URL for a provider.
    pub fn base_url(&self, provider: Provider) -> &str {
        match provider {
            Provider::Google => &self.google_base_url,
            Provider::OpenAi => &self.openai_base_url,
        }
    }

    /// Prompt text budget for a provider.
    pub fn max_chars(&self, provider: Provider) -> usize {
        match provider {
            Provider::Google => self.google_max_chars,
            Provider::OpenAi => self.openai_max_chars,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rule-based extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Reject GSTIN candidates whose check character does not verify.
    pub validate_gstin: bool,

    /// Document type used when none is found.
    pub default_document_type: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validate_gstin: false,
            default_document_type: "Tax Invoice".to_string(),
        }
    }
}

/// CSV output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the CSV files.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of documents processed concurrently.
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| InvexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| InvexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"llm": {"provider": "openai", "timeout_secs": 5}}"#).unwrap();

        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.timeout(), Duration::from_secs(5));
        assert_eq!(config.llm.openai_model, "gpt-4");
        assert_eq!(config.pdf.min_text_chars, 100);
        assert_eq!(config.batch.workers, 4);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.pdf.max_pages = 3;
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pdf.max_pages, 3);
        assert_eq!(loaded.llm.max_chars(Provider::Google), 10_000);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"batch": {"workers": "many"}}"#).unwrap();

        assert!(matches!(InvexConfig::from_file(&path), Err(InvexError::Config(_))));
        assert!(matches!(
            InvexConfig::from_file(&dir.path().join("missing.json")),
            Err(InvexError::Io(_))
        ));
    }
}
