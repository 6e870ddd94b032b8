/// Data loading modules for speaker-verification training
pub mod batch;
pub mod cycler;
pub mod prefetch;
pub mod speaker;
pub mod speaker_dataset;
pub mod utterance;

pub use batch::{SpeakerBatch, TrainingBatch};
pub use cycler::{Cycler, ItemCycler, RandomCycler, SequentialCycler};
pub use prefetch::PrefetchLoader;
pub use speaker::Speaker;
pub use speaker_dataset::{SpeakerVerificationDataLoader, SpeakerVerificationDataset, RANDOM_DATASET_LEN};
pub use utterance::{Partial, Utterance};

/// Generic data loader trait
pub trait BatchDataLoader {
    type Batch;

    /// Get next batch, `None` when the epoch is over
    fn next_batch(&mut self) -> crate::Result<Option<Self::Batch>>;

    /// Reset loader for new epoch
    fn reset(&mut self);

    /// Get total number of batches
    fn num_batches(&self) -> usize;
}
