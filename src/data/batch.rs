/// Sampled partials grouped per speaker
use candle_core::{Device, Tensor};
use ndarray::{Array3, Axis};

use super::utterance::Partial;
use crate::SpeakerDataError;

/// The partials drawn for one speaker within a batch
#[derive(Debug, Clone)]
pub struct SpeakerBatch {
    pub speaker: String,
    pub partials: Vec<Partial>,
}

/// Every speaker's partials from one collation call, in sampling order
#[derive(Debug, Clone, Default)]
pub struct TrainingBatch {
    pub speakers: Vec<SpeakerBatch>,
}

impl TrainingBatch {
    pub fn new(speakers: Vec<SpeakerBatch>) -> Self {
        Self { speakers }
    }

    pub fn num_speakers(&self) -> usize {
        self.speakers.len()
    }

    pub fn num_partials(&self) -> usize {
        self.speakers.iter().map(|s| s.partials.len()).sum()
    }

    /// Speaker names, one per speaker entry
    pub fn speaker_names(&self) -> Vec<&str> {
        self.speakers.iter().map(|s| s.speaker.as_str()).collect()
    }

    /// Stack all partials into `[num_partials, n_frames, mel_channels]`
    ///
    /// Partials are ordered speaker by speaker.
    pub fn data(&self) -> crate::Result<Array3<f32>> {
        let views: Vec<_> = self
            .speakers
            .iter()
            .flat_map(|s| s.partials.iter().map(|p| p.frames.view()))
            .collect();

        if views.is_empty() {
            return Err(SpeakerDataError::Dataset("cannot stack an empty batch".to_string()));
        }

        Ok(ndarray::stack(Axis(0), &views)?)
    }

    /// Batch data as an f32 tensor on `device`
    pub fn to_tensor(&self, device: &Device) -> crate::Result<Tensor> {
        let data = self.data()?;
        let shape = data.dim();
        let flat: Vec<f32> = data.iter().copied().collect();
        Ok(Tensor::from_vec(flat, shape, device)?)
    }
}
