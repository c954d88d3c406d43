//! Extraction by shelling out to `pdftotext` and `tesseract`

use super::{DocumentExtractor, DocumentKind, ExtractionError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// A command that reads the document on stdin and writes text to stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    program: String,
    args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// `pdftotext - -`: PDF on stdin, UTF-8 text on stdout
    pub fn pdftotext() -> Self {
        Self::new("pdftotext", &["-q", "-enc", "UTF-8", "-", "-"])
    }

    /// `tesseract stdin stdout`: OCR of an image on stdin
    pub fn tesseract() -> Self {
        Self::new("tesseract", &["stdin", "stdout"])
    }
}

#[derive(Debug, Clone)]
pub struct ExternalToolExtractor {
    pdf: ExternalTool,
    image: ExternalTool,
    timeout: Duration,
}

impl Default for ExternalToolExtractor {
    fn default() -> Self {
        Self::new(ExternalTool::pdftotext(), ExternalTool::tesseract())
    }
}

impl ExternalToolExtractor {
    pub fn new(pdf: ExternalTool, image: ExternalTool) -> Self {
        Self {
            pdf,
            image,
            timeout: EXTRACTION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, tool: &ExternalTool, bytes: &[u8]) -> Result<String, ExtractionError> {
        let path = which::which(&tool.program)
            .map_err(|_| ExtractionError::ToolMissing(tool.program.clone()))?;

        let mut child = Command::new(&path)
            .args(&tool.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::Failed(format!("failed to start {}: {e}", tool.program)))?;

        let work = async {
            if let Some(mut stdin) = child.stdin.take() {
                // A tool that exits early closes the pipe; its exit status reports why
                let _ = stdin.write_all(bytes).await;
                drop(stdin);
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| ExtractionError::Timeout)?
            .map_err(|e| ExtractionError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Failed(format!(
                "{} exited with {}: {}",
                tool.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl DocumentExtractor for ExternalToolExtractor {
    async fn extract(&self, bytes: &[u8], kind: DocumentKind) -> Result<String, ExtractionError> {
        let tool = match kind {
            DocumentKind::Pdf => &self.pdf,
            DocumentKind::Image => &self.image,
        };
        let start = std::time::Instant::now();
        let result = self.run(tool, bytes).await;
        match &result {
            Ok(text) => tracing::info!(
                tool = %tool.program,
                bytes = bytes.len(),
                chars = text.chars().count(),
                duration_ms = %start.elapsed().as_millis(),
                "Document extracted"
            ),
            Err(e) => tracing::warn!(tool = %tool.program, error = %e, "Document extraction failed"),
        }
        result
    }
}
