//! Single-document pipeline: text, fields, normalization, CSV.

use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::DocumentError;
use crate::invoice::llm::Credentials;
use crate::invoice::{FieldExtractor, RegexFieldExtractor};
use crate::models::config::InvexConfig;
use crate::models::invoice::{ExtractionMethod, RawExtraction};
use crate::normalize::{NormalizedInvoice, Normalizer};
use crate::ocr::PageOcr;
use crate::output::{CsvOutput, CsvWriter};
use crate::pdf::{ExtractedText, TextExtractor, TextSource};

/// Result of processing one document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub serial_number: String,
    pub method: ExtractionMethod,
    pub text_source: TextSource,
    pub normalized: NormalizedInvoice,
    pub output: CsvOutput,
    /// Why the LLM path was abandoned, when it was.
    pub llm_error: Option<String>,
}

/// Document id: first 16 hex digits of the SHA-256 of the PDF bytes.
pub fn serial_number(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Processes PDFs one at a time.
pub struct Pipeline {
    text: Arc<TextExtractor>,
    llm: Option<Arc<dyn FieldExtractor>>,
    fallback: RegexFieldExtractor,
    normalizer: Normalizer,
    writer: CsvWriter,
}

impl Pipeline {
    /// A regex-only pipeline without OCR.
    pub fn new(config: &InvexConfig) -> Self {
        Self {
            text: Arc::new(TextExtractor::new(&config.pdf)),
            llm: None,
            fallback: RegexFieldExtractor::from_config(&config.extraction),
            normalizer: Normalizer::from_config(&config.extraction),
            writer: CsvWriter::from_config(&config.output),
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn PageOcr>) -> Self {
        let text = TextExtractor::clone(&self.text).with_ocr(ocr);
        self.text = Arc::new(text);
        self
    }

    pub fn with_llm(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.llm = Some(extractor);
        self
    }

    pub fn with_writer(mut self, writer: CsvWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn writer(&self) -> &CsvWriter {
        &self.writer
    }

    /// Extract document text off the async executor.
    pub async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, DocumentError> {
        let extractor = Arc::clone(&self.text);
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || extractor.extract(&data))
            .await
            .map_err(|e| DocumentError::UnreadablePdf(format!("text extraction aborted: {}", e)))?
    }

    /// Run the LLM extractor, falling back to the regex extractor on any failure.
    ///
    /// Returns the mapping, the extractor that produced it and the LLM failure, if any.
    pub async fn extract_fields(
        &self,
        text: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(RawExtraction, ExtractionMethod, Option<String>), DocumentError> {
        let mut llm_error = None;

        match (&self.llm, credentials) {
            (Some(llm), Some(credentials)) => match llm.extract_fields(text, Some(credentials)).await {
                Ok(raw) if !raw.is_empty() => return Ok((raw, llm.method(), None)),
                Ok(_) => {
                    warn!("LLM returned no fields, using rule-based extraction");
                    llm_error = Some("LLM returned no fields".to_string());
                }
                Err(e) => {
                    warn!("LLM extraction failed, using rule-based extraction: {}", e);
                    llm_error = Some(e.to_string());
                }
            },
            (Some(_), None) => debug!("No credentials supplied, using rule-based extraction"),
            (None, _) => {}
        }

        let raw = self.fallback.parse(text);
        if raw.is_empty() {
            return Err(DocumentError::NoFieldsExtracted);
        }
        Ok((raw, self.fallback.method(), llm_error))
    }

    /// Process PDF bytes end to end and write both CSV files.
    pub async fn process_bytes(
        &self,
        bytes: &[u8],
        credentials: Option<&Credentials>,
    ) -> Result<ProcessedDocument, DocumentError> {
        let serial_number = serial_number(bytes);
        let text = self.extract_text(bytes).await?;
        debug!(serial = %serial_number, source = ?text.source, chars = text.text.len(), "text extracted");

        let (raw, method, llm_error) = self.extract_fields(&text.text, credentials).await?;
        let normalized = self.normalizer.normalize(&raw, &serial_number, method);
        let output = self.writer.write(&normalized)?;

        info!(
            serial = %serial_number,
            method = %method.remark(),
            line_items = normalized.line_items.len(),
            warnings = normalized.warnings.len(),
            "document processed"
        );

        Ok(ProcessedDocument {
            serial_number,
            method,
            text_source: text.source,
            normalized,
            output,
            llm_error,
        })
    }

    /// Read and process a PDF file.
    pub async fn process_file(
        &self,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<ProcessedDocument, DocumentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocumentError::UnreadablePdf(format!("{}: {}", path.display(), e)))?;
        self.process_bytes(&bytes, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::llm::{LlmFieldExtractor, Provider};
    use crate::models::config::LlmConfig;
    use crate::testing::{FixedTransport, SAMPLE_INVOICE_LINES, text_pdf};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const LLM_REPLY: &str = r#"{
        "invoice_data": {
            "Invoice Number": "INV-2024-001",
            "Invoice Date": "15-Mar-2024",
            "Supplier Name": "Acme Traders Pvt Ltd",
            "Total Invoice Value": "1,234.56"
        },
        "line_items": [
            {"Item Description": "Steel Bolt", "Quantity": "10", "Line Total Value": "1234.56"}
        ]
    }"#;

    fn config(dir: &Path) -> InvexConfig {
        let mut config = InvexConfig::default();
        config.output.dir = dir.to_path_buf();
        config
    }

    fn llm(reply: &str) -> (Arc<FixedTransport>, Arc<dyn FieldExtractor>) {
        let transport = Arc::new(FixedTransport::new(reply));
        let extractor = LlmFieldExtractor::with_transport(Provider::Google, LlmConfig::default(), transport.clone());
        (transport, Arc::new(extractor))
    }

    fn key() -> Credentials {
        Credentials::new(Provider::Google, "test-key")
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_serial_number_is_stable() {
        let a = serial_number(b"same bytes");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, serial_number(b"same bytes"));
        assert_ne!(a, serial_number(b"other bytes"));
    }

    #[tokio::test]
    async fn test_regex_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&config(dir.path()));

        let (raw, method, _) = pipeline
            .extract_fields("Invoice No: INV-2024-001\nTotal: 1,234.56", None)
            .await
            .unwrap();
        let normalized = Normalizer::new().normalize(&raw, "s", method);

        assert_eq!(method, ExtractionMethod::Rules);
        assert_eq!(normalized.invoice.invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(
            normalized.invoice.total_invoice_value.as_ref().and_then(|v| v.value()),
            Some(&Decimal::from_str("1234.56").unwrap())
        );
    }

    #[tokio::test]
    async fn test_llm_path_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, extractor) = llm(LLM_REPLY);
        let pipeline = Pipeline::new(&config(dir.path())).with_llm(extractor);
        let bytes = text_pdf(&[SAMPLE_INVOICE_LINES]);

        let doc = pipeline.process_bytes(&bytes, Some(&key())).await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(doc.method, ExtractionMethod::Llm(Provider::Google));
        assert_eq!(doc.serial_number, serial_number(&bytes));
        assert_eq!(doc.normalized.line_items.len(), 1);
        assert!(doc.llm_error.is_none());
        assert!(read(&doc.output.invoice_path).contains("Extracted with Google LLM"));
        assert!(read(&doc.output.invoice_path).contains("2024-03-15"));
    }

    #[tokio::test]
    async fn test_invalid_llm_reply_matches_regex_output() {
        let bytes = text_pdf(&[SAMPLE_INVOICE_LINES]);

        let regex_dir = tempfile::tempdir().unwrap();
        let regex_only = Pipeline::new(&config(regex_dir.path()));
        let expected = regex_only.process_bytes(&bytes, None).await.unwrap();

        for reply in ["not json at all", r#"{"invoice_data": {"Invoice Number": "X"}}"#] {
            let dir = tempfile::tempdir().unwrap();
            let (transport, extractor) = llm(reply);
            let pipeline = Pipeline::new(&config(dir.path())).with_llm(extractor);

            let doc = pipeline.process_bytes(&bytes, Some(&key())).await.unwrap();

            assert_eq!(transport.calls(), 2, "one clarifying retry");
            assert_eq!(doc.method, ExtractionMethod::Rules);
            assert!(doc.llm_error.is_some());
            assert_eq!(doc.normalized, expected.normalized);
            assert_eq!(read(&doc.output.invoice_path), read(&expected.output.invoice_path));
            assert_eq!(read(&doc.output.line_items_path), read(&expected.output.line_items_path));
        }
    }

    #[tokio::test]
    async fn test_pipeline_is_idempotent() {
        let bytes = text_pdf(&[SAMPLE_INVOICE_LINES]);
        let mut outputs = Vec::new();

        for _ in 0..2 {
            let dir = tempfile::tempdir().unwrap();
            let (_, extractor) = llm(LLM_REPLY);
            let pipeline = Pipeline::new(&config(dir.path())).with_llm(extractor);
            let doc = pipeline.process_bytes(&bytes, Some(&key())).await.unwrap();
            outputs.push((read(&doc.output.invoice_path), read(&doc.output.line_items_path)));
        }

        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_llm() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, extractor) = llm(LLM_REPLY);
        let pipeline = Pipeline::new(&config(dir.path())).with_llm(extractor);

        let doc = pipeline
            .process_bytes(&text_pdf(&[SAMPLE_INVOICE_LINES]), None)
            .await
            .unwrap();

        assert_eq!(transport.calls(), 0);
        assert_eq!(doc.method, ExtractionMethod::Rules);
        assert_eq!(doc.normalized.invoice.invoice_number.as_deref(), Some("INV-2024-001"));
    }

    #[tokio::test]
    async fn test_document_failures() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&config(dir.path()));

        let err = pipeline.process_bytes(b"garbage", None).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnreadablePdf(_)));

        let err = pipeline
            .process_bytes(&text_pdf(&[&["lorem ipsum dolor sit amet"]]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NoFieldsExtracted));

        let err = pipeline.process_file(&dir.path().join("missing.pdf"), None).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnreadablePdf(_)));
    }
}
