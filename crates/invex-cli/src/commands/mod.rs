//! Subcommands and the setup they share.

pub mod batch;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tracing::{debug, warn};

use invex_core::models::config::InvexConfig;
use invex_core::{Credentials, LlmFieldExtractor, Pipeline, Provider, PureOcrEngine};

/// Extraction options shared by `process` and `batch`.
#[derive(Args, Clone)]
pub struct ExtractionArgs {
    /// LLM provider: google or openai (default from config)
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// API key for the provider (default: GOOGLE_API_KEY / OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Use only the rule-based extractor
    #[arg(long)]
    pub no_llm: bool,

    /// Never OCR scanned pages
    #[arg(long)]
    pub no_ocr: bool,

    /// OCR model directory (overrides config)
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load the configuration used by processing commands.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<InvexConfig> {
    match explicit {
        Some(path) => InvexConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e)),
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Using config from {}", path.display());
                Ok(InvexConfig::from_file(&path)?)
            } else {
                Ok(InvexConfig::default())
            }
        }
    }
}

/// Build the pipeline and resolve credentials once, at the boundary.
pub fn build_pipeline(config: &InvexConfig, args: &ExtractionArgs) -> (Pipeline, Option<Credentials>) {
    let mut pipeline = Pipeline::new(config);

    if config.ocr.enabled && !args.no_ocr {
        let mut ocr_config = config.ocr.clone();
        if let Some(dir) = &args.model_dir {
            ocr_config.model_dir = dir.clone();
        }
        match PureOcrEngine::from_config(&ocr_config) {
            Ok(engine) => pipeline = pipeline.with_ocr(Arc::new(engine)),
            Err(e) => warn!("OCR disabled: {}", e),
        }
    }

    if args.no_llm {
        return (pipeline, None);
    }

    let provider = args.provider.unwrap_or(config.llm.provider);
    let credentials = Credentials::resolve(provider, args.api_key.as_deref(), |var| std::env::var(var).ok());
    if credentials.is_none() {
        debug!("No {} API key, using rule-based extraction", provider.display_name());
        return (pipeline, None);
    }

    match LlmFieldExtractor::new(provider, config.llm.clone()) {
        Ok(extractor) => (pipeline.with_llm(Arc::new(extractor)), credentials),
        Err(e) => {
            warn!("LLM extraction disabled: {}", e);
            (pipeline, None)
        }
    }
}
