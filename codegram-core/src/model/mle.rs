use std::collections::HashMap;

use log::info;

use super::ngram_count::{CountTable, split_last};
use super::prediction_table::{Candidate, PredictionTable};
use crate::config::Smoothing;

/// Unsmoothed relative-frequency estimator at a single order.
///
/// `P(w | h) = C(h w) / C(h *)`, where `C(h *)` is the number of n-grams
/// of the table starting with `h`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaximumLikelihoodEstimator;

impl MaximumLikelihoodEstimator {
	/// Computes the prediction table of every context of `table`.
	pub fn estimate(&self, table: &CountTable) -> PredictionTable {
		let mut prefix_totals: HashMap<&str, usize> = HashMap::new();
		for (ngram, count) in table.iter() {
			if let Some((prefix, _)) = split_last(ngram) {
				*prefix_totals.entry(prefix).or_insert(0) += count;
			}
		}

		let mut predictions = PredictionTable::new(table.order(), Smoothing::MaximumLikelihood);
		for (ngram, count) in table.iter() {
			let Some((context, token)) = split_last(ngram) else {
				continue;
			};
			let probability = match prefix_totals.get(context) {
				Some(&total) if total > 0 => count as f64 / total as f64,
				_ => 0.0,
			};
			predictions.insert(context.to_owned(), Candidate::new(probability, token));
		}
		predictions.sort_candidates();

		info!("maximum likelihood table built: {} contexts of order {}", predictions.len(), table.order());
		predictions
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

	#[test]
	fn probabilities_are_relative_frequencies() {
		let counts = CountTable::from_corpus(3, &corpus(&["a b ;", "a b ;", "a c ;", "a b {"])).unwrap();
		let table = MaximumLikelihoodEstimator.estimate(&counts);
		assert_eq!(table.order(), 3);
		assert_eq!(table.smoothing(), Smoothing::MaximumLikelihood);

		let after_ab = table.lookup("a b").unwrap();
		assert_eq!(after_ab[0], Candidate::new(2.0 / 3.0, ";"));
		assert_eq!(after_ab[1], Candidate::new(1.0 / 3.0, "{"));
		assert_eq!(table.lookup("a c").unwrap(), &[Candidate::new(1.0, ";")]);
	}

	#[test]
	fn bigram_tables_use_single_token_contexts() {
		let counts = CountTable::from_corpus(2, &corpus(&["x y", "x z", "x y"])).unwrap();
		let table = MaximumLikelihoodEstimator.estimate(&counts);
		let after_x = table.lookup("x").unwrap();
		assert_eq!(after_x[0].token, "y");
		let total: f64 = after_x.iter().map(|c| c.probability).sum();
		assert!((total - 1.0).abs() < 1e-12);
	}

	#[test]
	fn empty_counts_give_an_empty_table() {
		let counts = CountTable::new(3).unwrap();
		assert!(MaximumLikelihoodEstimator.estimate(&counts).is_empty());
	}
}
