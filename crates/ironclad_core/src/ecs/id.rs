//! # Entity Identity
//!
//! Entities are identified by a random, non-zero 32-bit number.
//!
//! - Zero is reserved as the invalid sentinel
//! - Ids are unique among *live* entities only; a removed entity's id may be
//!   handed out again later
//! - The random source is owned by the [`World`](super::World), never global

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Unique identifier for a live entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// The reserved "no entity" id.
    pub const INVALID: Self = Self(0);

    /// Wraps a raw id value.
    ///
    /// `0` produces [`EntityId::INVALID`].
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks whether this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Random id source, re-rolling on collision with a live id.
///
/// # Thread Safety
///
/// Not synchronized. It is owned by a single `World`, which is itself driven
/// from one simulation thread.
pub struct IdGenerator {
    rng: ChaCha8Rng,
    rerolls: u64,
}

impl IdGenerator {
    /// Creates a generator with a fixed seed (reproducible id sequences).
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            rerolls: 0,
        }
    }

    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            rerolls: 0,
        }
    }

    /// Returns a uniformly random non-zero id for which `is_live` is false.
    ///
    /// Draws again on zero or on a collision. With a 32-bit space the retry
    /// loop almost never runs more than once.
    pub fn next_id<F>(&mut self, is_live: F) -> EntityId
    where
        F: Fn(EntityId) -> bool,
    {
        loop {
            let candidate = EntityId(self.rng.gen::<u32>());
            if candidate.is_invalid() || is_live(candidate) {
                self.rerolls += 1;
                tracing::trace!(candidate = candidate.raw(), "entity id re-rolled");
                continue;
            }
            return candidate;
        }
    }

    /// Number of draws discarded so far (zero or collision).
    #[inline]
    #[must_use]
    pub const fn rerolls(&self) -> u64 {
        self.rerolls
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
