use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

use crate::config::Smoothing;
use crate::error::Result;

/// A candidate next token with its estimated probability.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Candidate {
	pub probability: f64,
	pub token: String,
}

impl Candidate {
	pub fn new(probability: f64, token: impl Into<String>) -> Self {
		Self {
			probability,
			token: token.into(),
		}
	}

	/// Ranking order: higher probability first, then higher token.
	///
	/// Equivalent to sorting `(probability, token)` pairs in reverse.
	pub fn rank(&self, other: &Self) -> Ordering {
		other
			.probability
			.total_cmp(&self.probability)
			.then_with(|| other.token.cmp(&self.token))
	}
}

/// Mapping from a context to its ranked next-token candidates.
///
/// Contexts are `order - 1` tokens joined by single spaces. This is the
/// only artifact kept after training; it is never mutated afterwards and
/// can be shared by any number of decoders.
///
/// # Invariants
/// - Every candidate list with two or more entries is sorted by `Candidate::rank`
/// - Every probability is finite and >= 0
/// - Only continuations observed in training are present
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionTable {
	order: usize,
	smoothing: Smoothing,
	entries: HashMap<String, Vec<Candidate>>,
}

impl PredictionTable {
	pub(crate) fn new(order: usize, smoothing: Smoothing) -> Self {
		Self {
			order,
			smoothing,
			entries: HashMap::new(),
		}
	}

	/// Appends a candidate to a context, unsorted.
	pub(crate) fn insert(&mut self, context: String, candidate: Candidate) {
		self.entries.entry(context).or_default().push(candidate);
	}

	/// Sorts every candidate list holding more than one entry.
	pub(crate) fn sort_candidates(&mut self) {
		for candidates in self.entries.values_mut() {
			if candidates.len() > 1 {
				candidates.sort_by(Candidate::rank);
			}
		}
	}

	/// Ranked candidates of a space-joined context.
	///
	/// Returns `None` when the context was never observed; callers decide
	/// how to handle a missing prediction.
	pub fn lookup(&self, context: &str) -> Option<&[Candidate]> {
		self.entries.get(context).map(Vec::as_slice)
	}

	/// Ranked candidates following a token window.
	///
	/// Only the last `order - 1` tokens of the window are used. A window
	/// shorter than that cannot match any context.
	pub fn predict_next(&self, window: &[String]) -> Option<&[Candidate]> {
		let width = self.order - 1;
		if window.len() < width {
			return None;
		}
		self.lookup(&window[window.len() - width..].join(" "))
	}

	/// The n-gram order the table was trained with.
	pub fn order(&self) -> usize {
		self.order
	}

	pub fn smoothing(&self) -> Smoothing {
		self.smoothing
	}

	/// Number of distinct contexts.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates over the known contexts in arbitrary order.
	pub fn contexts(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Iterates over every `(context, candidates)` entry.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[Candidate])> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
	}

	/// Returns a random known context, useful as a generation seed.
	///
	/// Returns `None` if the table is empty.
	pub fn random_context<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		self.contexts().choose(rng)
	}

	/// Serializes the table with `postcard`.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(postcard::from_bytes(bytes)?)
	}

	/// Writes the serialized table to `path`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		std::fs::write(path, self.to_bytes()?)?;
		Ok(())
	}

	/// Reads a table written by `save`.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		Self::from_bytes(&bytes)
	}
}
