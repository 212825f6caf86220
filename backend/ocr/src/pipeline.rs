//! OCR pipeline: payload normalization, engine invocation, result shaping.
//!
//! The contract is deterministic with respect to the input bytes: the same
//! payload always normalizes, decodes, and derives the same way. Engine
//! failures surface as recoverable errors; the pipeline never takes the
//! process down.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use vigil_core::{OcrResult, VigilError};

use crate::engine::OcrEngine;

pub struct OcrPipeline {
    engine: Arc<dyn OcrEngine>,
    languages: Vec<String>,
}

impl OcrPipeline {
    pub fn new(engine: Arc<dyn OcrEngine>, languages: Vec<String>) -> Self {
        Self { engine, languages }
    }

    /// Accept raw base64 or a data-URL (`<scheme>,<base64>`): everything up
    /// to the first comma is a scheme prefix and is discarded.
    pub fn normalize_image_data(raw: &str) -> Result<Vec<u8>, VigilError> {
        let trimmed = raw.trim();
        let encoded = match trimmed.split_once(',') {
            Some((_scheme, rest)) => rest,
            None => trimmed,
        };
        if encoded.is_empty() {
            return Err(VigilError::InvalidImageData("empty payload".into()));
        }
        STANDARD
            .decode(encoded)
            .map_err(|e| VigilError::InvalidImageData(e.to_string()))
    }

    /// Run one image through the engine. No engine call happens for
    /// invalid input.
    pub async fn extract(&self, image_data: &str) -> Result<OcrResult, VigilError> {
        let started = Instant::now();
        let bytes = Self::normalize_image_data(image_data)?;

        let raw = self
            .engine
            .recognize(&bytes, &self.languages)
            .await
            .map_err(|e| VigilError::OcrFailure(e.to_string()))?;

        let text = raw.text.trim().to_string();
        let word_count = text.split_whitespace().count();
        let text_length = text.chars().count();

        Ok(OcrResult {
            confidence: (raw.mean_confidence / 100.0).clamp(0.0, 1.0),
            processing_time_ms: started.elapsed().as_millis() as u64,
            word_count,
            text_length,
            text,
        })
    }
}
