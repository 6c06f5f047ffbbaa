//! Play modes and the index-advance algorithm.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// How the current index advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Walk the list in order, wrapping at both ends
    #[default]
    SequentialLoop,
    /// Stay on the current item
    RepeatOne,
    /// Walk a random permutation, wrapping at both ends
    Shuffle,
}

impl PlayMode {
    /// Cycle to the next mode (for a single toggle button).
    pub fn cycle(self) -> Self {
        match self {
            Self::SequentialLoop => Self::RepeatOne,
            Self::RepeatOne => Self::Shuffle,
            Self::Shuffle => Self::SequentialLoop,
        }
    }
}

/// Direction of an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Self::Forward
    }
}

/// Maps (mode, current, count, direction) to the next index.
///
/// The only state is the cached shuffle permutation. It is regenerated when
/// its length no longer matches the playlist length and is never touched
/// otherwise, so one forward cycle visits every index exactly once.
#[derive(Debug, Clone, Default)]
pub struct ModeResolver {
    permutation: Vec<usize>,
}

impl ModeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with a fixed shuffle permutation.
    ///
    /// Returns `None` if `permutation` is not a permutation of `0..len`.
    pub fn with_permutation(permutation: Vec<usize>) -> Option<Self> {
        let mut resolver = Self::new();
        resolver.set_permutation(permutation).then_some(resolver)
    }

    /// Replace the shuffle permutation. Rejected unless it is a permutation of `0..len`.
    pub fn set_permutation(&mut self, permutation: Vec<usize>) -> bool {
        let mut seen = vec![false; permutation.len()];
        for &i in &permutation {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        self.permutation = permutation;
        true
    }

    /// Current shuffle permutation (empty until first needed).
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Drop the cached permutation so the next shuffle advance draws a fresh one.
    pub fn reset(&mut self) {
        self.permutation.clear();
    }

    /// Next index for an advance, or `None` if the list is empty or
    /// `current` is out of range.
    pub fn next_index(
        &mut self,
        mode: PlayMode,
        current: usize,
        count: usize,
        direction: Direction,
    ) -> Option<usize> {
        if count == 0 || current >= count {
            return None;
        }

        match mode {
            PlayMode::SequentialLoop => Some(step(current, count, direction)),
            PlayMode::RepeatOne => Some(current),
            PlayMode::Shuffle => {
                if self.permutation.len() != count {
                    self.regenerate(count);
                }
                let slot = self.permutation.iter().position(|&i| i == current)?;
                Some(self.permutation[step(slot, count, direction)])
            }
        }
    }

    fn regenerate(&mut self, count: usize) {
        let mut indices: Vec<usize> = (0..count).collect();
        let mut rng = rand::rng();
        indices.shuffle(&mut rng);
        tracing::debug!("Regenerated shuffle permutation of {} items", count);
        self.permutation = indices;
    }
}

/// One wrapping step through `0..count`.
fn step(position: usize, count: usize, direction: Direction) -> usize {
    match direction {
        Direction::Forward => (position + 1) % count,
        Direction::Backward => (position + count - 1) % count,
    }
}
