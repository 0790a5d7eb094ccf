use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::TokenStream;

/// Occurrence counts of every n-gram of one fixed order.
///
/// Keys are the n-grams rendered as space-joined tokens, so a table can be
/// queried with the same strings the prediction table uses as contexts.
///
/// # Responsibilities
/// - Window token streams into contiguous n-grams (never across streams)
/// - Accumulate occurrence counts
/// - Merge with another table of the same order (shard-local counting)
///
/// # Invariants
/// - `n` is always >= 2
/// - Every stored count is >= 1
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CountTable {
	/// The order of the table (number of tokens per n-gram)
	n: usize,

	/// Space-joined n-gram to occurrence count
	counts: HashMap<String, usize>,
}

impl CountTable {
	/// Creates an empty table of order `n`.
	///
	/// # Errors
	/// Returns an error if `n < 2`.
	pub fn new(n: usize) -> Result<Self> {
		if n < 2 {
			return Err(ModelError::invalid(format!("n-gram order must be >= 2, got {n}")));
		}
		Ok(Self { n, counts: HashMap::new() })
	}

	/// Counts every n-gram of a corpus.
	///
	/// # Errors
	/// Returns an error if `n < 2` or if a token is empty or contains
	/// whitespace.
	pub fn from_corpus(n: usize, corpus: &[TokenStream]) -> Result<Self> {
		let mut table = Self::new(n)?;
		for stream in corpus {
			table.add_stream(stream)?;
		}
		Ok(table)
	}

	/// Order of the table.
	pub fn order(&self) -> usize {
		self.n
	}

	/// Adds every n-gram of one token stream.
	///
	/// Streams shorter than `n` contribute nothing. A stream holding an
	/// empty token or a token with whitespace is rejected before anything
	/// is counted.
	pub fn add_stream(&mut self, tokens: &[String]) -> Result<()> {
		check_stream(tokens)?;
		for window in tokens.windows(self.n) {
			*self.counts.entry(window.join(" ")).or_insert(0) += 1;
		}
		Ok(())
	}

	/// Occurrence count of a space-joined n-gram.
	pub fn count(&self, ngram: &str) -> Option<usize> {
		self.counts.get(ngram).copied()
	}

	/// Iterates over `(n-gram, count)` pairs in arbitrary order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
		self.counts.iter().map(|(k, v)| (k.as_str(), *v))
	}

	/// Number of distinct n-grams.
	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Sums the counts of `other` into this table.
	///
	/// # Errors
	/// Returns an error if the orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.n != other.n {
			return Err(ModelError::OrderMismatch {
				expected: self.n,
				found: other.n,
			});
		}

		for (ngram, count) in &other.counts {
			*self.counts.entry(ngram.clone()).or_insert(0) += *count;
		}

		Ok(())
	}
}

/// Keys are space-joined, so a token must be non-empty and free of
/// whitespace for `split_last` to recover it.
pub(crate) fn check_stream(tokens: &[String]) -> Result<()> {
	match tokens.iter().find(|token| token.is_empty() || token.contains(char::is_whitespace)) {
		Some(token) => Err(ModelError::invalid(format!(
			"token {token:?} is empty or contains whitespace"
		))),
		None => Ok(()),
	}
}

/// Splits a space-joined n-gram into its `n - 1` token prefix and last token.
///
/// Returns `None` for a single token.
pub(crate) fn split_last(ngram: &str) -> Option<(&str, &str)> {
	ngram.rsplit_once(' ')
}
