/// A speaker directory and its utterance cycler
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use super::cycler::{Cycler, ItemCycler};
use super::utterance::{Partial, Utterance};
use crate::config::SamplingMode;
use crate::SpeakerDataError;

/// Index of utterances written by preprocessing, one `frames_fname,wave_fpath` per line
pub const SOURCES_FNAME: &str = "_sources.txt";

/// Utterances are listed and their cycler built on first sampling
pub struct Speaker {
    root: PathBuf,
    name: String,
    mode: SamplingMode,
    rng: StdRng,
    mel_n_channels: Option<usize>,
    utterances: Option<Vec<Utterance>>,
    utterance_cycler: Option<ItemCycler<usize>>,
}

impl Speaker {
    /// Create a speaker for a directory; nothing is read until sampling
    pub fn new<P: Into<PathBuf>>(root: P, mode: SamplingMode, seed: Option<u64>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            root,
            name,
            mode,
            rng,
            mel_n_channels: None,
            utterances: None,
            utterance_cycler: None,
        }
    }

    /// Speaker identity, the directory name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// Reject utterances whose frames are not `n` channels wide
    pub fn set_mel_n_channels(&mut self, n: usize) {
        self.mel_n_channels = Some(n);
    }

    /// Utterances of this speaker, listing them on first access
    pub fn utterances(&mut self) -> crate::Result<&[Utterance]> {
        if self.utterances.is_none() {
            let utterances = list_utterances(&self.root)?;
            log::debug!("Speaker {}: {} utterances", self.name, utterances.len());
            self.utterances = Some(utterances);
        }
        Ok(self.utterances.as_deref().unwrap_or_default())
    }

    fn load(&mut self) -> crate::Result<()> {
        if self.utterance_cycler.is_some() {
            return Ok(());
        }

        let count = self.utterances()?.len();
        if count == 0 {
            log::warn!("Speaker {} has no utterances in {:?}", self.name, self.root);
        }
        let seed = match self.mode {
            SamplingMode::Random => Some(rand::Rng::gen(&mut self.rng)),
            SamplingMode::Sequential => None,
        };
        self.utterance_cycler = Some(ItemCycler::new(0..count, self.mode, seed)?);
        Ok(())
    }

    /// Draw `count` partials of `n_frames` frames each
    ///
    /// Utterances are chosen through this speaker's cycler, so every utterance is
    /// used once before any repeats. Fails if the speaker has no utterances.
    pub fn sample_partials(&mut self, count: usize, n_frames: usize) -> crate::Result<Vec<Partial>> {
        self.load()?;

        let indices = match self.utterance_cycler.as_mut() {
            Some(cycler) => cycler.sample(count),
            None => return Err(SpeakerDataError::EmptyCycler),
        };
        let utterances = self.utterances.as_deref().unwrap_or_default();

        let mut partials = Vec::with_capacity(count);
        for idx in indices {
            let partial = utterances[idx].partial(n_frames, self.mode, &mut self.rng)?;
            if let Some(expected) = self.mel_n_channels {
                let found = partial.frames.ncols();
                if found != expected {
                    return Err(SpeakerDataError::Dataset(format!(
                        "{:?}: {} mel channels, expected {}",
                        partial.utterance.frames_fpath, found, expected
                    )));
                }
            }
            partials.push(partial);
        }
        Ok(partials)
    }
}

impl std::fmt::Debug for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Speaker")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("mode", &self.mode)
            .finish()
    }
}

/// List utterances from `_sources.txt`, or every `.npy` file when there is no index
fn list_utterances(root: &Path) -> crate::Result<Vec<Utterance>> {
    let sources_fpath = root.join(SOURCES_FNAME);
    if sources_fpath.exists() {
        let text = fs::read_to_string(&sources_fpath)?;
        let mut utterances = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (frames_fname, wave_fpath) = line.split_once(',').ok_or_else(|| {
                SpeakerDataError::Dataset(format!(
                    "{:?} line {}: expected 'frames_fname,wave_fpath'",
                    sources_fpath,
                    lineno + 1
                ))
            })?;
            utterances.push(Utterance::new(root.join(frames_fname.trim()), wave_fpath.trim()));
        }
        return Ok(utterances);
    }

    let mut frames_fpaths = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "npy") {
            frames_fpaths.push(path);
        }
    }
    frames_fpaths.sort();

    Ok(frames_fpaths
        .into_iter()
        .map(|path| Utterance::new(path, PathBuf::new()))
        .collect())
}
