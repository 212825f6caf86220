pub mod engine;
pub mod pipeline;

pub use engine::{OcrEngine, RawRecognition, TesseractEngine};
pub use pipeline::OcrPipeline;
