//! Recognition engine abstraction.
//!
//! The production engine shells out to the `tesseract` CLI in TSV mode so
//! the broker carries no system-library linkage; anything implementing
//! `OcrEngine` (a vision endpoint, a test double) slots in behind the same
//! seam.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Raw engine output before pipeline normalization. Confidence is on the
/// engine's native 0–100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecognition {
    pub text: String,
    pub mean_confidence: f64,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize text in an already-decoded image buffer.
    async fn recognize(&self, image: &[u8], languages: &[String]) -> Result<RawRecognition>;
}

/// Runs the `tesseract` binary with the image on stdin and TSV on stdout.
pub struct TesseractEngine {
    binary: PathBuf,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &[u8], languages: &[String]) -> Result<RawRecognition> {
        // `quiet` keeps engine progress chatter off stderr so it never
        // interleaves with broker logs.
        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(languages.join("+"))
            .arg("tsv")
            .arg("quiet")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.binary.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .context("tesseract stdin unavailable")?;
        stdin
            .write_all(image)
            .await
            .context("writing image to tesseract")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("waiting for tesseract")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract exited with {}: {}", output.status, stderr.trim());
        }

        let recognition = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(
            words = recognition.text.split_whitespace().count(),
            confidence = recognition.mean_confidence,
            "tesseract pass complete"
        );
        Ok(recognition)
    }
}

/// Parse tesseract TSV output: word rows are level 5, confidence in column
/// 10, text in column 11. Non-word rows carry confidence -1 and are skipped.
fn parse_tsv(tsv: &str) -> RawRecognition {
    let mut text = String::new();
    let mut confidences: Vec<f64> = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }

        let line_key = (
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        if !text.is_empty() {
            if current_line == Some(line_key) {
                text.push(' ');
            } else {
                text.push('\n');
            }
        }
        current_line = Some(line_key);
        text.push_str(word);

        if let Ok(conf) = cols[10].parse::<f64>() {
            if conf >= 0.0 {
                confidences.push(conf);
            }
        }
    }

    let mean_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    RawRecognition {
        text,
        mean_confidence,
    }
}
