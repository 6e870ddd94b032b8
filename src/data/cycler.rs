/// Round-robin samplers with full coverage before repetition
///
/// For a source of `n` items and one or more queries totalling `m` items, the
/// random cycler guarantees:
/// - each item is returned between `m / n` and `(m - 1) / n + 1` times
/// - at most `2 * (n - 1)` other items lie between two appearances of the same item
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;

use crate::config::SamplingMode;
use crate::SpeakerDataError;

/// Stateful sampler over a fixed collection
pub trait Cycler<T> {
    /// Draw `count` items, continuing across rounds as needed
    fn sample(&mut self, count: usize) -> Vec<T>;

    /// Number of items in one round
    fn len(&self) -> usize;

    /// Draw a single item
    fn next_item(&mut self) -> T {
        // sample(1) always yields one item for a non-empty source
        self.sample(1).remove(0)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cycler that reshuffles its items at every round boundary
#[derive(Debug, Clone)]
pub struct RandomCycler<T> {
    all_items: Vec<T>,
    next_items: VecDeque<T>,
    rng: StdRng,
}

impl<T: Clone> RandomCycler<T> {
    /// Create an entropy-seeded cycler
    pub fn new<I: IntoIterator<Item = T>>(source: I) -> crate::Result<Self> {
        Self::with_rng(source, StdRng::from_entropy())
    }

    /// Create a cycler with a reproducible shuffle order
    pub fn with_seed<I: IntoIterator<Item = T>>(source: I, seed: u64) -> crate::Result<Self> {
        Self::with_rng(source, StdRng::seed_from_u64(seed))
    }

    fn with_rng<I: IntoIterator<Item = T>>(source: I, rng: StdRng) -> crate::Result<Self> {
        let all_items: Vec<T> = source.into_iter().collect();
        if all_items.is_empty() {
            return Err(SpeakerDataError::EmptyCycler);
        }

        Ok(Self {
            all_items,
            next_items: VecDeque::new(),
            rng,
        })
    }

    fn shuffled(&mut self) -> Vec<T> {
        let mut items = self.all_items.clone();
        items.shuffle(&mut self.rng);
        items
    }

    /// All items in source order
    pub fn items(&self) -> &[T] {
        &self.all_items
    }
}

impl<T: Clone> Cycler<T> for RandomCycler<T> {
    fn sample(&mut self, mut count: usize) -> Vec<T> {
        let n = self.all_items.len();
        let mut out = Vec::with_capacity(count);

        while count > 0 {
            // Whole rounds are emitted directly and leave the pending round untouched
            if count >= n {
                let round = self.shuffled();
                out.extend(round);
                count -= n;
                continue;
            }

            let take = count.min(self.next_items.len());
            out.extend(self.next_items.drain(..take));
            count -= take;

            if self.next_items.is_empty() {
                self.next_items = self.shuffled().into();
            }
        }

        out
    }

    fn len(&self) -> usize {
        self.all_items.len()
    }
}

/// Cycler that repeats the source order every round
#[derive(Debug, Clone)]
pub struct SequentialCycler<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Clone> SequentialCycler<T> {
    pub fn new<I: IntoIterator<Item = T>>(source: I) -> crate::Result<Self> {
        let items: Vec<T> = source.into_iter().collect();
        if items.is_empty() {
            return Err(SpeakerDataError::EmptyCycler);
        }

        Ok(Self { items, cursor: 0 })
    }

    /// Position of the next item within the current round
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Rewind to the start of a round
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl<T: Clone> Cycler<T> for SequentialCycler<T> {
    fn sample(&mut self, count: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.items[self.cursor].clone());
            self.cursor = (self.cursor + 1) % self.items.len();
        }
        out
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Either cycler variant, chosen by [`SamplingMode`]
#[derive(Debug, Clone)]
pub enum ItemCycler<T> {
    Random(RandomCycler<T>),
    Sequential(SequentialCycler<T>),
}

impl<T: Clone> ItemCycler<T> {
    /// Build the cycler for `mode`; `seed` only affects random mode
    pub fn new<I: IntoIterator<Item = T>>(
        source: I,
        mode: SamplingMode,
        seed: Option<u64>,
    ) -> crate::Result<Self> {
        match mode {
            SamplingMode::Random => {
                let cycler = match seed {
                    Some(seed) => RandomCycler::with_seed(source, seed)?,
                    None => RandomCycler::new(source)?,
                };
                Ok(Self::Random(cycler))
            }
            SamplingMode::Sequential => Ok(Self::Sequential(SequentialCycler::new(source)?)),
        }
    }

    pub fn mode(&self) -> SamplingMode {
        match self {
            Self::Random(_) => SamplingMode::Random,
            Self::Sequential(_) => SamplingMode::Sequential,
        }
    }

    /// Restart a sequential round; random cyclers have no fixed start
    pub fn rewind(&mut self) {
        if let Self::Sequential(c) = self {
            c.rewind();
        }
    }
}

impl<T: Clone> Cycler<T> for ItemCycler<T> {
    fn sample(&mut self, count: usize) -> Vec<T> {
        match self {
            Self::Random(c) => c.sample(count),
            Self::Sequential(c) => c.sample(count),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Random(c) => c.len(),
            Self::Sequential(c) => c.len(),
        }
    }
}
