/// Utterance feature files and fixed-length partial windows
use ndarray::{s, Array2};
use ndarray_npy::ReadNpyExt;
use rand::Rng;
use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::config::SamplingMode;
use crate::SpeakerDataError;

/// One preprocessed utterance on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Mel frames saved as `[n_frames, mel_channels]` float32
    pub frames_fpath: PathBuf,
    /// Source audio the frames were extracted from, empty when unknown
    pub wave_fpath: PathBuf,
}

/// A fixed-length window of frames cut from one utterance
#[derive(Debug, Clone)]
pub struct Partial {
    pub utterance: Utterance,
    /// Frame range within the full utterance
    pub range: Range<usize>,
    /// `[range.len(), mel_channels]`
    pub frames: Array2<f32>,
}

impl Utterance {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(frames_fpath: P, wave_fpath: Q) -> Self {
        Self {
            frames_fpath: frames_fpath.into(),
            wave_fpath: wave_fpath.into(),
        }
    }

    /// Load the full frame matrix
    pub fn get_frames(&self) -> crate::Result<Array2<f32>> {
        read_frames(&self.frames_fpath)
    }

    /// Cut a window of `n_frames` frames
    ///
    /// Random mode picks a uniform offset, sequential mode takes the leading window.
    pub fn partial<R: Rng>(
        &self,
        n_frames: usize,
        mode: SamplingMode,
        rng: &mut R,
    ) -> crate::Result<Partial> {
        let frames = self.get_frames()?;
        let total = frames.nrows();
        if total < n_frames {
            return Err(SpeakerDataError::UtteranceTooShort {
                path: self.frames_fpath.clone(),
                frames: total,
                required: n_frames,
            });
        }

        let start = match mode {
            SamplingMode::Random => rng.gen_range(0..=total - n_frames),
            SamplingMode::Sequential => 0,
        };
        let range = start..start + n_frames;

        Ok(Partial {
            utterance: self.clone(),
            frames: frames.slice(s![range.clone(), ..]).to_owned(),
            range,
        })
    }
}

fn read_frames(path: &Path) -> crate::Result<Array2<f32>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(<Array2<f32> as ReadNpyExt>::read_npy(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::WriteNpyExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn write_ramp(path: &Path, n_frames: usize, channels: usize) {
        let frames = Array2::from_shape_fn((n_frames, channels), |(t, _)| t as f32);
        frames.write_npy(File::create(path).unwrap()).unwrap();
    }

    #[test]
    fn test_random_partial_window() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("utt.npy");
        write_ramp(&path, 50, 4);

        let utterance = Utterance::new(&path, "");
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let partial = utterance.partial(16, SamplingMode::Random, &mut rng)?;
            assert_eq!(partial.frames.dim(), (16, 4));
            assert_eq!(partial.range.len(), 16);
            assert!(partial.range.end <= 50);
            // Ramp values equal the source frame index
            assert_eq!(partial.frames[[0, 0]], partial.range.start as f32);
        }

        Ok(())
    }

    #[test]
    fn test_random_offsets_include_last_window() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("utt.npy");
        write_ramp(&path, 12, 1);

        let utterance = Utterance::new(&path, "");
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let partial = utterance.partial(10, SamplingMode::Random, &mut rng)?;
            seen[partial.range.start] = true;
        }
        assert_eq!(seen, [true, true, true]);

        Ok(())
    }

    #[test]
    fn test_sequential_partial_is_leading_window() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("utt.npy");
        write_ramp(&path, 30, 2);

        let utterance = Utterance::new(&path, "");
        let mut rng = StdRng::seed_from_u64(0);
        let partial = utterance.partial(10, SamplingMode::Sequential, &mut rng)?;
        assert_eq!(partial.range, 0..10);
        assert_eq!(partial.frames[[9, 1]], 9.0);

        Ok(())
    }

    #[test]
    fn test_exact_length_and_too_short() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("utt.npy");
        write_ramp(&path, 8, 3);

        let utterance = Utterance::new(&path, "");
        let mut rng = StdRng::seed_from_u64(1);
        let partial = utterance.partial(8, SamplingMode::Random, &mut rng)?;
        assert_eq!(partial.range, 0..8);

        let err = utterance.partial(9, SamplingMode::Random, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            SpeakerDataError::UtteranceTooShort { frames: 8, required: 9, .. }
        ));

        Ok(())
    }
}
