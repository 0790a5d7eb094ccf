use std::path::Path;

use log::{info, warn};

use super::count_index::ContextCountIndex;
use super::kneser_ney::KneserNeyEstimator;
use super::mle::MaximumLikelihoodEstimator;
use super::ngram_count::CountTable;
use super::prediction_table::PredictionTable;
use crate::config::{Smoothing, TrainConfig};
use crate::error::Result;
use crate::io::{cache_path, read_corpus};
use crate::vocab::Vocabulary;
use crate::{PAD_TOKEN, TokenStream};

/// Prepends `order - 1` padding tokens to a stream.
///
/// With padding, the first real token of a line is predicted from a
/// context made of `<pad>` tokens, which is what decoders query when they
/// start from a short seed.
pub fn pad_stream(stream: &[String], order: usize) -> TokenStream {
	let mut padded = Vec::with_capacity(stream.len() + order.saturating_sub(1));
	padded.extend(std::iter::repeat_n(PAD_TOKEN.to_owned(), order.saturating_sub(1)));
	padded.extend_from_slice(stream);
	padded
}

/// Builds a prediction table from a tokenized corpus.
///
/// # Parameters
/// - `corpus`: the token streams (one per source line).
/// - `config`: order, smoothing, padding and sharding.
///
/// # Errors
/// Returns an error if the configuration is invalid, or if a token is
/// empty or contains whitespace. Nothing is computed in either case.
///
/// # Behavior
/// - Kneser-Ney: counts orders `2..=order` (sharded), then folds the
///   interpolated probabilities.
/// - Maximum likelihood: counts the single top order only.
pub fn train(corpus: &[TokenStream], config: &TrainConfig) -> Result<PredictionTable> {
	config.validate()?;
	info!(
		"training order {} {} model on {} streams",
		config.order,
		config.smoothing.tag(),
		corpus.len()
	);

	let padded: Vec<TokenStream>;
	let streams = if config.pad_streams {
		padded = corpus.iter().map(|stream| pad_stream(stream, config.order)).collect();
		&padded
	} else {
		corpus
	};

	match config.smoothing {
		Smoothing::KneserNey { discount } => {
			let estimator = KneserNeyEstimator::new(discount)?;
			let index = ContextCountIndex::from_corpus_sharded(streams, config.order, config.shards)?;
			estimator.estimate(&index)
		}
		Smoothing::MaximumLikelihood => {
			let counts = CountTable::from_corpus(config.order, streams)?;
			Ok(MaximumLikelihoodEstimator.estimate(&counts))
		}
	}
}

/// Same as `train`, after mapping out-of-vocabulary tokens to `<idf>`.
pub fn train_with_vocabulary(
	corpus: &[TokenStream],
	vocabulary: &Vocabulary,
	config: &TrainConfig,
) -> Result<PredictionTable> {
	let encoded: Vec<TokenStream> = corpus.iter().map(|stream| vocabulary.replace_unknown(stream)).collect();
	train(&encoded, config)
}

/// Loads the cached table of a corpus file, or trains and caches it.
///
/// - The cache sits next to the corpus (`<stem>.<order>gram-<kn|mle>.bin`).
/// - A cache built with another order or smoothing is ignored and rebuilt.
/// - Uses `postcard` for compact serialization.
pub fn load_or_train<P: AsRef<Path>>(corpus_path: P, config: &TrainConfig) -> Result<PredictionTable> {
	config.validate()?;
	let binary_path = cache_path(&corpus_path, config.order, config.smoothing.tag())?;

	if binary_path.exists() {
		match PredictionTable::load(&binary_path) {
			Ok(table) if table.order() == config.order && table.smoothing() == config.smoothing => {
				info!("loaded cached table {}", binary_path.display());
				return Ok(table);
			}
			Ok(_) => warn!("cache {} was built with other settings, retraining", binary_path.display()),
			Err(e) => warn!("unreadable cache {}: {e}, retraining", binary_path.display()),
		}
	}

	let corpus = read_corpus(&corpus_path)?;
	let table = train(&corpus, config)?;
	table.save(&binary_path)?;
	info!("cached table written to {}", binary_path.display());
	Ok(table)
}
