/// Configuration for speaker-verification batch sampling
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// How cyclers order their items from one round to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Reshuffle every round, random partial offsets
    #[default]
    Random,
    /// Fixed order every round, leading partial window
    Sequential,
}

impl std::str::FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "random" => Ok(Self::Random),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "Invalid sampling mode: {}. Must be 'random' or 'sequential'",
                other
            )),
        }
    }
}

/// Batch sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerDataConfig {
    /// Number of speakers per training batch
    pub speakers_per_batch: usize,

    /// Number of partials drawn for each speaker
    pub utterances_per_speaker: usize,

    /// Frames per utterance partial
    pub partials_n_frames: usize,

    /// Mel channels per frame
    pub mel_n_channels: usize,

    /// Cycling strategy
    pub mode: SamplingMode,

    /// Seed for every random draw; entropy-seeded when absent
    pub seed: Option<u64>,

    /// Worker threads used by the prefetching loader
    pub num_workers: usize,

    /// Batches buffered ahead of the consumer
    pub prefetch_depth: usize,
}

impl Default for SpeakerDataConfig {
    fn default() -> Self {
        Self {
            speakers_per_batch: 64,
            utterances_per_speaker: 10,
            partials_n_frames: 160, // 1.6s at 10ms hop
            mel_n_channels: 40,
            mode: SamplingMode::Random,
            seed: None,
            num_workers: 8,
            prefetch_depth: 4,
        }
    }
}

impl SpeakerDataConfig {
    /// Load configuration from a JSON file, missing fields fall back to defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.speakers_per_batch == 0 {
            return Err(crate::SpeakerDataError::Config(
                "speakers_per_batch must be > 0".to_string(),
            ));
        }

        if self.utterances_per_speaker == 0 {
            return Err(crate::SpeakerDataError::Config(
                "utterances_per_speaker must be > 0".to_string(),
            ));
        }

        if self.partials_n_frames == 0 || self.mel_n_channels == 0 {
            return Err(crate::SpeakerDataError::Config(
                "partials_n_frames and mel_n_channels must be > 0".to_string(),
            ));
        }

        if self.num_workers == 0 || self.prefetch_depth == 0 {
            return Err(crate::SpeakerDataError::Config(
                "num_workers and prefetch_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of partials in one full batch
    pub fn partials_per_batch(&self) -> usize {
        self.speakers_per_batch * self.utterances_per_speaker
    }
}
