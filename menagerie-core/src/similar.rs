use std::hash::{Hash, Hasher};

use crate::error::ModelError;

/// Two distinct values and how similar they are.
///
/// Equality and hashing ignore member order, so `(a, b)` and `(b, a)` are
/// the same pair. The similarity score does not take part in equality.
#[derive(Debug, Clone, Copy)]
pub struct SimilarPair<T> {
    first: T,
    second: T,
    similarity: f64,
}

impl<T: PartialEq> SimilarPair<T> {
    pub fn new(first: T, second: T, similarity: f64) -> Result<Self, ModelError> {
        if first == second {
            return Err(ModelError::invalid_pair("members must not be equal"));
        }
        if !(0.0..=1.0).contains(&similarity) {
            return Err(ModelError::invalid_pair(format!(
                "similarity must be between 0 and 1, inclusive: {similarity}"
            )));
        }
        Ok(Self {
            first,
            second,
            similarity,
        })
    }

    pub fn contains(&self, value: &T) -> bool {
        self.first == *value || self.second == *value
    }
}

impl<T> SimilarPair<T> {
    pub fn first(&self) -> &T {
        &self.first
    }

    pub fn second(&self) -> &T {
        &self.second
    }

    pub fn similarity(&self) -> f64 {
        self.similarity
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> SimilarPair<U> {
        SimilarPair {
            first: f(&self.first),
            second: f(&self.second),
            similarity: self.similarity,
        }
    }
}

impl<T: PartialEq> PartialEq for SimilarPair<T> {
    fn eq(&self, other: &Self) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }
}

impl<T: Eq> Eq for SimilarPair<T> {}

impl<T: Hash> Hash for SimilarPair<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Combine member hashes commutatively so (a, b) and (b, a) collide.
        let member_hash = |value: &T| {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };
        state.write_u64(member_hash(&self.first).wrapping_add(member_hash(&self.second)));
    }
}

#[cfg(test)]
#[path = "tests/similar_tests.rs"]
mod tests;
