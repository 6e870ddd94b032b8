/// Multi-worker batch prefetching
///
/// Each worker thread owns its own dataset and therefore its own cyclers; no
/// cycling state is shared between threads. Batches arrive in completion order.
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use super::batch::TrainingBatch;
use super::speaker_dataset::{SpeakerVerificationDataset, RANDOM_DATASET_LEN};
use crate::config::{SamplingMode, SpeakerDataConfig};
use crate::SpeakerDataError;

type BatchResult = crate::Result<TrainingBatch>;

pub struct PrefetchLoader {
    receiver: Option<Receiver<BatchResult>>,
    workers: Vec<JoinHandle<()>>,
    num_batches: usize,
}

impl PrefetchLoader {
    /// Scan `root` once per worker and start `config.num_workers` threads
    ///
    /// Only random mode is supported: independent sequential workers would each
    /// replay the same speaker order.
    pub fn spawn<P: AsRef<Path>>(root: P, config: SpeakerDataConfig) -> crate::Result<Self> {
        config.validate()?;
        if config.mode == SamplingMode::Sequential {
            return Err(SpeakerDataError::Config(
                "prefetching requires random sampling mode".to_string(),
            ));
        }

        // Build every dataset up front so layout errors surface here
        let mut datasets = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers {
            let mut dataset = match config.seed {
                Some(seed) => SpeakerVerificationDataset::with_seed(
                    root.as_ref(),
                    config.mode,
                    seed.wrapping_add(worker_id as u64),
                )?,
                None => SpeakerVerificationDataset::new(root.as_ref(), config.mode)?,
            };
            dataset.set_mel_n_channels(config.mel_n_channels);
            datasets.push(dataset);
        }

        let (sender, receiver) = sync_channel(config.prefetch_depth);
        let workers = datasets
            .into_iter()
            .enumerate()
            .map(|(worker_id, dataset)| {
                let sender = sender.clone();
                let config = config.clone();
                thread::spawn(move || worker_loop(worker_id, dataset, config, sender))
            })
            .collect();

        log::info!(
            "Prefetch loader started: {} workers, depth {}",
            config.num_workers,
            config.prefetch_depth
        );

        Ok(Self {
            receiver: Some(receiver),
            workers,
            num_batches: RANDOM_DATASET_LEN / config.speakers_per_batch,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Block until a worker delivers a batch
    pub fn next_batch(&mut self) -> crate::Result<Option<TrainingBatch>> {
        let receiver = self
            .receiver
            .as_ref()
            .ok_or_else(|| SpeakerDataError::Dataset("prefetch loader is shut down".to_string()))?;

        match receiver.recv() {
            Ok(batch) => batch.map(Some),
            Err(_) => Err(SpeakerDataError::Dataset(
                "all prefetch workers have stopped".to_string(),
            )),
        }
    }
}

fn worker_loop(
    worker_id: usize,
    mut dataset: SpeakerVerificationDataset,
    config: SpeakerDataConfig,
    sender: SyncSender<BatchResult>,
) {
    log::debug!("Prefetch worker {} started", worker_id);
    loop {
        let batch = dataset.next_batch(
            config.speakers_per_batch,
            config.utterances_per_speaker,
            config.partials_n_frames,
        );
        let failed = batch.is_err();
        if sender.send(batch).is_err() || failed {
            break;
        }
    }
    log::debug!("Prefetch worker {} stopped", worker_id);
}

impl super::BatchDataLoader for PrefetchLoader {
    type Batch = TrainingBatch;

    fn next_batch(&mut self) -> crate::Result<Option<TrainingBatch>> {
        PrefetchLoader::next_batch(self)
    }

    /// Random sampling has no epoch boundary
    fn reset(&mut self) {}

    fn num_batches(&self) -> usize {
        self.num_batches
    }
}

impl Drop for PrefetchLoader {
    fn drop(&mut self) {
        // Closing the channel unblocks workers waiting in send
        self.receiver.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Prefetch worker panicked");
            }
        }
    }
}
