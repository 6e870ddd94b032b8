/// Speaker-verification dataset over a directory of preprocessed speakers
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::batch::{SpeakerBatch, TrainingBatch};
use super::cycler::{Cycler, ItemCycler};
use super::speaker::Speaker;
use crate::config::{SamplingMode, SpeakerDataConfig};
use crate::SpeakerDataError;

/// Nominal length reported by random-mode datasets, which never run out
pub const RANDOM_DATASET_LEN: usize = usize::MAX;

/// Speakers found under a root directory, drawn through a speaker cycler
///
/// Access is pull-based: every draw advances the cyclers, so the order of
/// speakers is decided by cycling state and never by an index.
pub struct SpeakerVerificationDataset {
    root: PathBuf,
    mode: SamplingMode,
    speakers: Vec<Speaker>,
    speaker_cycler: ItemCycler<usize>,
}

impl SpeakerVerificationDataset {
    /// Scan `root` with entropy-seeded cyclers
    pub fn new<P: AsRef<Path>>(root: P, mode: SamplingMode) -> crate::Result<Self> {
        Self::build(root.as_ref(), mode, None)
    }

    /// Scan `root` with reproducible cyclers
    pub fn with_seed<P: AsRef<Path>>(root: P, mode: SamplingMode, seed: u64) -> crate::Result<Self> {
        Self::build(root.as_ref(), mode, Some(seed))
    }

    /// Scan `root` using the mode and seed from `config`
    pub fn from_config<P: AsRef<Path>>(root: P, config: &SpeakerDataConfig) -> crate::Result<Self> {
        let mut dataset = Self::build(root.as_ref(), config.mode, config.seed)?;
        dataset.set_mel_n_channels(config.mel_n_channels);
        Ok(dataset)
    }

    fn build(root: &Path, mode: SamplingMode, seed: Option<u64>) -> crate::Result<Self> {
        log::info!("Loading speaker dataset from: {:?} ({:?} mode)", root, mode);

        let mut speaker_dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if path.is_dir() {
                speaker_dirs.push(path);
            }
        }
        speaker_dirs.sort();

        if speaker_dirs.is_empty() {
            return Err(SpeakerDataError::NoSpeakers(root.to_path_buf()));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let speakers: Vec<Speaker> = speaker_dirs
            .into_iter()
            .map(|dir| {
                let speaker_seed = seed.map(|_| rng.gen::<u64>());
                Speaker::new(dir, mode, speaker_seed)
            })
            .collect();
        let cycler_seed = seed.map(|_| rng.gen::<u64>());
        let speaker_cycler = ItemCycler::new(0..speakers.len(), mode, cycler_seed)?;

        log::info!("Dataset loaded: {} speakers", speakers.len());

        Ok(Self {
            root: root.to_path_buf(),
            mode,
            speakers,
            speaker_cycler,
        })
    }

    /// Reported length: exact speaker count in sequential mode, a sentinel in random mode
    pub fn len(&self) -> usize {
        match self.mode {
            SamplingMode::Random => RANDOM_DATASET_LEN,
            SamplingMode::Sequential => self.speakers.len(),
        }
    }

    /// Always false, construction fails without speakers
    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn num_speakers(&self) -> usize {
        self.speakers.len()
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn speaker(&self, id: usize) -> Option<&Speaker> {
        self.speakers.get(id)
    }

    /// Require `n` mel channels in every utterance drawn from now on
    pub fn set_mel_n_channels(&mut self, n: usize) {
        for speaker in &mut self.speakers {
            speaker.set_mel_n_channels(n);
        }
    }

    /// Restart the speaker order at the beginning of a sequential round
    pub fn rewind(&mut self) {
        self.speaker_cycler.rewind();
    }

    /// Draw the next speaker
    pub fn next_speaker(&mut self) -> &mut Speaker {
        let id = self.speaker_cycler.next_item();
        &mut self.speakers[id]
    }

    /// Index-style access kept for loaders that address items by position
    ///
    /// The index is ignored; this is `next_speaker`.
    pub fn get_item(&mut self, _index: usize) -> &mut Speaker {
        self.next_speaker()
    }

    /// Draw `count` speaker ids through the speaker cycler
    pub fn sample_speaker_ids(&mut self, count: usize) -> Vec<usize> {
        self.speaker_cycler.sample(count)
    }

    /// Draw `utterances_per_speaker` partials for each speaker id
    pub fn collate(
        &mut self,
        speaker_ids: &[usize],
        utterances_per_speaker: usize,
        partials_n_frames: usize,
    ) -> crate::Result<TrainingBatch> {
        let mut speakers = Vec::with_capacity(speaker_ids.len());
        for &id in speaker_ids {
            let speaker = self.speakers.get_mut(id).ok_or_else(|| {
                SpeakerDataError::Dataset(format!("speaker id {} out of range", id))
            })?;
            let partials = speaker.sample_partials(utterances_per_speaker, partials_n_frames)?;
            speakers.push(SpeakerBatch {
                speaker: speaker.name().to_string(),
                partials,
            });
        }

        log::debug!(
            "Collated {} speakers x {} partials of {} frames",
            speakers.len(),
            utterances_per_speaker,
            partials_n_frames
        );

        Ok(TrainingBatch::new(speakers))
    }

    /// Sample speakers and collate them in one step
    pub fn next_batch(
        &mut self,
        speakers_per_batch: usize,
        utterances_per_speaker: usize,
        partials_n_frames: usize,
    ) -> crate::Result<TrainingBatch> {
        let ids = self.sample_speaker_ids(speakers_per_batch);
        self.collate(&ids, utterances_per_speaker, partials_n_frames)
    }

    /// Concatenated contents of every `.txt` file under the root
    pub fn logs(&self) -> crate::Result<String> {
        let mut log_string = String::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                log_string.push_str(&fs::read_to_string(path)?);
            }
        }
        Ok(log_string)
    }
}

impl std::fmt::Debug for SpeakerVerificationDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerVerificationDataset")
            .field("root", &self.root)
            .field("mode", &self.mode)
            .field("num_speakers", &self.speakers.len())
            .finish()
    }
}

/// Data loader drawing configured batches from a speaker dataset
pub struct SpeakerVerificationDataLoader {
    dataset: SpeakerVerificationDataset,
    config: SpeakerDataConfig,
    speakers_drawn: usize,
}

impl SpeakerVerificationDataLoader {
    /// Create new data loader
    pub fn new(mut dataset: SpeakerVerificationDataset, config: SpeakerDataConfig) -> crate::Result<Self> {
        config.validate()?;
        dataset.set_mel_n_channels(config.mel_n_channels);
        if config.mode != dataset.mode() {
            log::warn!(
                "Loader configured for {:?} mode over a {:?} dataset, using the dataset's mode",
                config.mode,
                dataset.mode()
            );
        }

        log::info!(
            "Data loader created: {} speakers x {} utterances, {} frames per partial",
            config.speakers_per_batch,
            config.utterances_per_speaker,
            config.partials_n_frames
        );

        Ok(Self {
            dataset,
            config,
            speakers_drawn: 0,
        })
    }

    /// Get next batch, `None` once a sequential epoch is exhausted
    pub fn next_batch(&mut self) -> crate::Result<Option<TrainingBatch>> {
        let count = match self.dataset.mode() {
            SamplingMode::Random => self.config.speakers_per_batch,
            SamplingMode::Sequential => {
                let remaining = self.dataset.num_speakers() - self.speakers_drawn;
                if remaining == 0 {
                    return Ok(None);
                }
                remaining.min(self.config.speakers_per_batch)
            }
        };

        let batch = self.dataset.next_batch(
            count,
            self.config.utterances_per_speaker,
            self.config.partials_n_frames,
        )?;
        self.speakers_drawn += count;

        Ok(Some(batch))
    }

    /// Reset loader for new epoch
    pub fn reset(&mut self) {
        self.speakers_drawn = 0;
        self.dataset.rewind();
    }

    /// Get number of batches per epoch
    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        match self.dataset.mode() {
            SamplingMode::Random => len / self.config.speakers_per_batch,
            SamplingMode::Sequential => len.div_ceil(self.config.speakers_per_batch),
        }
    }

    /// Get dataset reference
    pub fn dataset(&self) -> &SpeakerVerificationDataset {
        &self.dataset
    }

    pub fn config(&self) -> &SpeakerDataConfig {
        &self.config
    }
}

impl super::BatchDataLoader for SpeakerVerificationDataLoader {
    type Batch = TrainingBatch;

    fn next_batch(&mut self) -> crate::Result<Option<TrainingBatch>> {
        SpeakerVerificationDataLoader::next_batch(self)
    }

    fn reset(&mut self) {
        SpeakerVerificationDataLoader::reset(self)
    }

    fn num_batches(&self) -> usize {
        SpeakerVerificationDataLoader::num_batches(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::BatchDataLoader;
    use ndarray::Array2;
    use ndarray_npy::WriteNpyExt;
    use std::collections::HashSet;
    use std::fs::File;
    use tempfile::TempDir;

    pub(crate) const N_FRAMES: usize = 20;
    pub(crate) const N_MELS: usize = 8;

    /// Root with one directory per `(name, utterance_count)`, each utterance 30 frames
    pub(crate) fn make_root(speakers: &[(&str, usize)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, count) in speakers {
            let speaker_dir = dir.path().join(name);
            fs::create_dir(&speaker_dir).unwrap();
            let mut sources = String::new();
            for i in 0..*count {
                let fname = format!("utterance_{:02}.npy", i);
                let frames = Array2::<f32>::from_elem((30, N_MELS), i as f32);
                frames.write_npy(File::create(speaker_dir.join(&fname)).unwrap()).unwrap();
                sources.push_str(&format!("{},{}.wav\n", fname, i));
            }
            fs::write(speaker_dir.join("_sources.txt"), sources).unwrap();
        }
        dir
    }

    fn config(mode: SamplingMode, speakers_per_batch: usize) -> SpeakerDataConfig {
        SpeakerDataConfig {
            speakers_per_batch,
            utterances_per_speaker: 2,
            partials_n_frames: N_FRAMES,
            mel_n_channels: N_MELS,
            mode,
            seed: Some(17),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_speakers_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stray.txt"), "not a speaker").unwrap();

        let result = SpeakerVerificationDataset::new(dir.path(), SamplingMode::Random);
        assert!(matches!(result, Err(SpeakerDataError::NoSpeakers(_))));
    }

    #[test]
    fn test_reported_lengths() -> crate::Result<()> {
        let root = make_root(&[("a", 1), ("b", 1), ("c", 1)]);

        let sequential = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;
        assert_eq!(sequential.len(), 3);

        let random = SpeakerVerificationDataset::with_seed(root.path(), SamplingMode::Random, 1)?;
        assert_eq!(random.len(), RANDOM_DATASET_LEN);
        assert_eq!(random.num_speakers(), 3);

        let bigger = make_root(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1)]);
        let random = SpeakerVerificationDataset::with_seed(bigger.path(), SamplingMode::Random, 1)?;
        assert_eq!(random.len(), RANDOM_DATASET_LEN);

        Ok(())
    }

    #[test]
    fn test_partials_per_speaker_independent_of_utterance_count() -> crate::Result<()> {
        let root = make_root(&[("A", 3), ("B", 5)]);
        let mut dataset = SpeakerVerificationDataset::with_seed(root.path(), SamplingMode::Random, 5)?;

        for _ in 0..4 {
            let batch = dataset.next_batch(2, 2, N_FRAMES)?;
            assert_eq!(batch.num_speakers(), 2);
            for speaker in &batch.speakers {
                assert_eq!(speaker.partials.len(), 2);
                for partial in &speaker.partials {
                    assert_eq!(partial.frames.dim(), (N_FRAMES, N_MELS));
                }
            }
            assert_eq!(batch.data()?.dim(), (4, N_FRAMES, N_MELS));
        }

        Ok(())
    }

    #[test]
    fn test_get_item_ignores_index() -> crate::Result<()> {
        let root = make_root(&[("a", 1), ("b", 1), ("c", 1)]);
        let mut dataset = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;

        let names: Vec<String> = (0..4)
            .map(|_| dataset.get_item(0).name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "a"]);

        Ok(())
    }

    #[test]
    fn test_random_speakers_balanced_per_round() -> crate::Result<()> {
        let root = make_root(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
        let mut dataset = SpeakerVerificationDataset::with_seed(root.path(), SamplingMode::Random, 8)?;

        for _ in 0..10 {
            let round: HashSet<String> = (0..4)
                .map(|_| dataset.next_speaker().name().to_string())
                .collect();
            assert_eq!(round.len(), 4);
        }

        Ok(())
    }

    #[test]
    fn test_sequential_loader_epoch() -> crate::Result<()> {
        let root = make_root(&[("a", 2), ("b", 2), ("c", 2), ("d", 2), ("e", 2)]);
        let dataset = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;
        let mut loader = SpeakerVerificationDataLoader::new(dataset, config(SamplingMode::Sequential, 2))?;
        assert_eq!(loader.num_batches(), 3);

        let mut epoch = Vec::new();
        while let Some(batch) = loader.next_batch()? {
            epoch.push(batch.speaker_names().join(","));
        }
        assert_eq!(epoch, vec!["a,b", "c,d", "e"]);

        // Same order after reset
        BatchDataLoader::reset(&mut loader);
        let first = loader.next_batch()?.unwrap();
        assert_eq!(first.speaker_names(), vec!["a", "b"]);

        Ok(())
    }

    #[test]
    fn test_sequential_reset_mid_epoch() -> crate::Result<()> {
        let root = make_root(&[("a", 2), ("b", 2), ("c", 2), ("d", 2), ("e", 2)]);
        let dataset = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;
        let mut loader = SpeakerVerificationDataLoader::new(dataset, config(SamplingMode::Sequential, 2))?;

        let first = loader.next_batch()?.unwrap();
        assert_eq!(first.speaker_names(), vec!["a", "b"]);
        loader.reset();

        let mut epoch = Vec::new();
        while let Some(batch) = loader.next_batch()? {
            epoch.push(batch.speaker_names().join(","));
        }
        assert_eq!(epoch, vec!["a,b", "c,d", "e"]);

        Ok(())
    }

    #[test]
    fn test_loader_rejects_mel_channel_mismatch() -> crate::Result<()> {
        let root = make_root(&[("a", 2), ("b", 2)]);
        let dataset = SpeakerVerificationDataset::with_seed(root.path(), SamplingMode::Random, 3)?;
        let config = SpeakerDataConfig {
            mel_n_channels: 40,
            ..config(SamplingMode::Random, 1)
        };
        let mut loader = SpeakerVerificationDataLoader::new(dataset, config)?;

        assert!(matches!(loader.next_batch(), Err(SpeakerDataError::Dataset(_))));

        Ok(())
    }

    #[test]
    fn test_sequential_partials_are_reproducible() -> crate::Result<()> {
        let root = make_root(&[("a", 3), ("b", 3)]);
        let mut first = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;
        let mut second = SpeakerVerificationDataset::new(root.path(), SamplingMode::Sequential)?;

        let x = first.next_batch(2, 4, N_FRAMES)?.data()?;
        let y = second.next_batch(2, 4, N_FRAMES)?.data()?;
        assert_eq!(x, y);
        // Utterance i is filled with i, so the fourth partial wraps to utterance 0
        assert_eq!(x[[3, 0, 0]], 0.0);
        assert_eq!(x[[2, 0, 0]], 2.0);

        Ok(())
    }

    #[test]
    fn test_random_loader_never_ends() -> crate::Result<()> {
        let root = make_root(&[("a", 2), ("b", 2), ("c", 2)]);
        let dataset = SpeakerVerificationDataset::with_seed(root.path(), SamplingMode::Random, 2)?;
        let mut loader = SpeakerVerificationDataLoader::new(dataset, config(SamplingMode::Random, 2))?;
        assert_eq!(loader.num_batches(), RANDOM_DATASET_LEN / 2);

        for _ in 0..10 {
            let batch = loader.next_batch()?.unwrap();
            assert_eq!(batch.num_partials(), 4);
        }

        Ok(())
    }

    #[test]
    fn test_logs() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let speaker_dir = dir.path().join("spk");
        fs::create_dir(&speaker_dir)?;
        fs::write(speaker_dir.join("frames.npy"), b"")?;

        let dataset = SpeakerVerificationDataset::new(dir.path(), SamplingMode::Random)?;
        assert_eq!(dataset.logs()?, "");

        fs::write(dir.path().join("Log_a.txt"), "alpha\n")?;
        fs::write(speaker_dir.join("notes.txt"), "beta\n")?;
        assert_eq!(dataset.logs()?, "alpha\nbeta\n");

        Ok(())
    }
}
