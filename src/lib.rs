//! Speaker-balanced batch sampling for speaker-verification training
//!
//! Builds training batches for a speaker encoder out of a directory of
//! preprocessed speakers, and renders attention alignments and mel-spectrograms
//! to PNG files for training diagnostics.
//!
//! # Layout
//!
//! - **Cyclers**: round-robin samplers that visit every item once per round,
//!   either reshuffling each round or repeating a fixed order
//! - **Speakers**: one directory of `.npy` utterance features per speaker
//! - **Datasets and loaders**: pull-based speaker sampling and collation into
//!   fixed-length utterance partials
//! - **Plots**: alignment and spectrogram heatmaps
//!
//! # Example
//!
//! ```ignore
//! use speaker_batching::{SpeakerDataConfig, data::{SpeakerVerificationDataset, SpeakerVerificationDataLoader, BatchDataLoader}};
//!
//! let config = SpeakerDataConfig::default();
//! let dataset = SpeakerVerificationDataset::new("encoder_data/", config.mode)?;
//! let mut loader = SpeakerVerificationDataLoader::new(dataset, config)?;
//! let batch = loader.next_batch()?;
//! ```

use std::path::PathBuf;

pub mod config;
pub mod data;
pub mod plot;
pub mod utils;

// Re-export commonly used items
pub use config::{SamplingMode, SpeakerDataConfig};
pub use data::{SpeakerBatch, SpeakerVerificationDataset, TrainingBatch};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum SpeakerDataError {
    #[error("No speakers found in {0:?}")]
    NoSpeakers(PathBuf),

    #[error("Cycler was provided an empty collection")]
    EmptyCycler,

    #[error("Utterance {path:?} has {frames} frames, {required} required")]
    UtteranceTooShort {
        path: PathBuf,
        frames: usize,
        required: usize,
    },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NumPy read error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, SpeakerDataError>;
