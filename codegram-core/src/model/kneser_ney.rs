use std::collections::{BTreeMap, HashMap};

use log::{debug, info};

use super::count_index::ContextCountIndex;
use super::ngram_count::{CountTable, split_last};
use super::prediction_table::{Candidate, PredictionTable};
use crate::config::{Smoothing, check_discount};
use crate::error::{ModelError, Result};

/// Absolute discount subtracted from every count.
pub const DEFAULT_DISCOUNT: f64 = 0.75;

/// Continuation statistics of one order.
///
/// Derived from a count table and dropped once probabilities are computed.
#[derive(Debug)]
struct ContinuationStats {
	/// Token → number of distinct n-grams ending with it
	ending_with: HashMap<String, usize>,
	/// (n-1)-gram prefix → number of distinct n-grams starting with it
	starting_with: HashMap<String, usize>,
	/// Number of distinct n-grams of this order
	distinct: usize,
}

impl ContinuationStats {
	fn from_table(table: &CountTable) -> Self {
		let mut ending_with = HashMap::new();
		let mut starting_with = HashMap::new();
		for (ngram, _) in table.iter() {
			if let Some((prefix, last)) = split_last(ngram) {
				*starting_with.entry(prefix.to_owned()).or_insert(0) += 1;
				*ending_with.entry(last.to_owned()).or_insert(0) += 1;
			}
		}
		Self {
			ending_with,
			starting_with,
			distinct: table.len(),
		}
	}

	fn ending_with(&self, order: usize, token: &str) -> Result<f64> {
		self.ending_with
			.get(token)
			.map(|&n| n as f64)
			.ok_or_else(|| ModelError::context_not_found(order, token))
	}

	fn starting_with(&self, order: usize, prefix: &str) -> Result<f64> {
		self.starting_with
			.get(prefix)
			.map(|&n| n as f64)
			.ok_or_else(|| ModelError::context_not_found(order, prefix))
	}
}

/// Interpolated Kneser-Ney estimator.
///
/// For every n-gram observed at the highest order `N`, the probability of
/// its last token given its context is folded from order 2 upward:
///
/// - order 2: `P = max(c(w) - d, 0) / D2 + d / D2 * s(h) * c(w) / D2`
/// - order `i` in `3..N`: `P = max(c(w) - d, 0) / Di + d / Di * s(h) * P`
/// - order `N`: `P = max(C(h w) - d, 0) / C(h) + d / C(h) * s(h) * P`
///
/// where `c(w)` counts distinct n-grams ending in `w`, `s(h)` counts
/// distinct n-grams starting with the context `h` (the trailing `i - 1`
/// tokens at order `i`), `Di` is the number of distinct n-grams of order
/// `i` and `C` are raw counts.
#[derive(Clone, Copy, Debug)]
pub struct KneserNeyEstimator {
	discount: f64,
}

impl Default for KneserNeyEstimator {
	fn default() -> Self {
		Self {
			discount: DEFAULT_DISCOUNT,
		}
	}
}

impl KneserNeyEstimator {
	/// # Errors
	/// Returns an error if `discount` is outside `[0.0, 1.0)`.
	pub fn new(discount: f64) -> Result<Self> {
		check_discount(discount)?;
		Ok(Self { discount })
	}

	pub fn discount(&self) -> f64 {
		self.discount
	}

	/// Computes the prediction table of every top-order context.
	///
	/// # Errors
	/// - `InvalidConfiguration` if the index stops below order 3.
	/// - `ContextNotFound` if the tables are inconsistent with each other
	///   (never the case for an index counted from one corpus).
	pub fn estimate(&self, index: &ContextCountIndex) -> Result<PredictionTable> {
		let top = index.max_order();
		if top < 3 {
			return Err(ModelError::invalid(format!(
				"Kneser-Ney smoothing needs order >= 3, got {top}"
			)));
		}

		let stats: BTreeMap<usize, ContinuationStats> = index
			.tables()
			.map(|table| (table.order(), ContinuationStats::from_table(table)))
			.collect();
		debug!("continuation statistics ready for orders 2..={top}");

		let top_table = index
			.table(top)
			.ok_or_else(|| ModelError::invalid(format!("missing count table of order {top}")))?;

		let mut table = PredictionTable::new(
			top,
			Smoothing::KneserNey {
				discount: self.discount,
			},
		);
		for (ngram, count) in top_table.iter() {
			let tokens: Vec<&str> = ngram.split(' ').collect();
			let probability = self.probability(index, &stats, &tokens, count)?;
			let (context, token) = tokens.split_at(tokens.len() - 1);
			table.insert(context.join(" "), Candidate::new(probability, token[0]));
		}
		table.sort_candidates();

		info!("Kneser-Ney table built: {} contexts of order {}", table.len(), top);
		Ok(table)
	}

	/// Folds the interpolated probability of `tokens[N-1]` given the first
	/// `N - 1` tokens, from order 2 up to `N`.
	fn probability(
		&self,
		index: &ContextCountIndex,
		stats: &BTreeMap<usize, ContinuationStats>,
		tokens: &[&str],
		count: usize,
	) -> Result<f64> {
		let d = self.discount;
		let top = tokens.len();
		let token = tokens[top - 1];

		let mut probability = 0.0;
		for order in 2..top {
			let level = stats
				.get(&order)
				.ok_or_else(|| ModelError::invalid(format!("missing count table of order {order}")))?;
			let distinct = level.distinct as f64;
			let suffix = tokens[top - order..top - 1].join(" ");

			let continuation = level.ending_with(order, token)?;
			let p1 = (continuation - d).max(0.0) / distinct;
			let p2 = d / distinct * level.starting_with(order, &suffix)?;
			let lower = if order == 2 { continuation / distinct } else { probability };
			probability = p1 + p2 * lower;
		}

		let context = tokens[..top - 1].join(" ");
		let context_count = index
			.count(top - 1, &context)
			.ok_or_else(|| ModelError::context_not_found(top - 1, context.as_str()))? as f64;
		let followers = stats
			.get(&top)
			.ok_or_else(|| ModelError::invalid(format!("missing count table of order {top}")))?
			.starting_with(top, &context)?;

		let p1 = (count as f64 - d).max(0.0) / context_count;
		let p2 = d / context_count * followers;
		Ok(p1 + p2 * probability)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::TokenStream;

	fn corpus(lines: &[&str]) -> Vec<TokenStream> {
		lines
			.iter()
			.map(|line| line.split_whitespace().map(str::to_owned).collect())
			.collect()
	}

	fn padded(lines: &[&str], order: usize) -> Vec<TokenStream> {
		corpus(lines)
			.into_iter()
			.map(|stream| {
				let mut padded = vec![crate::PAD_TOKEN.to_owned(); order - 1];
				padded.extend(stream);
				padded
			})
			.collect()
	}

	#[test]
	fn matches_hand_computed_trigram_probabilities() {
		let index = ContextCountIndex::from_corpus(&padded(&["a b ;", "a b ;", "a c ;"], 3), 3).unwrap();
		let table = KneserNeyEstimator::default().estimate(&index).unwrap();

		// Bigram level: 6 distinct bigrams, "b" ends one, "a" starts two.
		// P2(b | a) = 0.25 / 6 + 0.75 / 6 * 2 * 1 / 6 = 1 / 12
		// P3(b | <pad> a) = 1.25 / 3 + 0.75 / 3 * 2 * 1 / 12 = 11 / 24
		let candidates = table.lookup("<pad> a").unwrap();
		assert_eq!(candidates[0].token, "b");
		assert!((candidates[0].probability - 11.0 / 24.0).abs() < 1e-12);
		assert_eq!(candidates[1].token, "c");
		assert!((candidates[1].probability - 0.125).abs() < 1e-12);

		let terminator = table.lookup("a b").unwrap();
		assert_eq!(terminator.len(), 1);
		assert_eq!(terminator[0].token, ";");
		assert!((terminator[0].probability - 0.71875).abs() < 1e-12);
	}

	#[test]
	fn zero_discount_reduces_to_relative_frequency() {
		let index = ContextCountIndex::from_corpus(&corpus(&["x y z", "x y z", "x y w"]), 3).unwrap();
		let table = KneserNeyEstimator::new(0.0).unwrap().estimate(&index).unwrap();
		let candidates = table.lookup("x y").unwrap();
		assert_eq!(candidates[0].token, "z");
		assert!((candidates[0].probability - 2.0 / 3.0).abs() < 1e-12);
		assert!((candidates[1].probability - 1.0 / 3.0).abs() < 1e-12);
	}

	#[test]
	fn four_gram_recursion_uses_trailing_contexts() {
		let index = ContextCountIndex::from_corpus(&corpus(&["p q r s", "q r t", "r s"]), 4).unwrap();
		let table = KneserNeyEstimator::default().estimate(&index).unwrap();
		let candidates = table.lookup("p q r").unwrap();
		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].token, "s");
		assert!(candidates[0].probability.is_finite() && candidates[0].probability > 0.0);
	}

	#[test]
	fn rejects_bigram_index() {
		let index = ContextCountIndex::from_corpus(&corpus(&["a b"]), 2).unwrap();
		assert!(matches!(
			KneserNeyEstimator::default().estimate(&index),
			Err(ModelError::InvalidConfiguration { .. })
		));
	}

	#[test]
	fn inconsistent_tables_report_missing_context() {
		// Bigrams and trigrams counted from different corpora
		let bigrams = CountTable::from_corpus(2, &corpus(&["a b c"])).unwrap();
		let trigrams = CountTable::from_corpus(3, &corpus(&["x y z"])).unwrap();
		let index = ContextCountIndex::from_tables(vec![trigrams, bigrams]).unwrap();
		assert!(matches!(
			KneserNeyEstimator::default().estimate(&index),
			Err(ModelError::ContextNotFound { order: 2, .. })
		));
	}

	#[test]
	fn discount_must_be_below_one() {
		assert!(KneserNeyEstimator::new(1.0).is_err());
		assert_eq!(KneserNeyEstimator::default().discount(), DEFAULT_DISCOUNT);
	}
}
