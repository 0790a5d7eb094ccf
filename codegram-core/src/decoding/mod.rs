//! Search-based decoding of token sequences.
//!
//! Decoders only see the `Scorer` capability: given a window of tokens,
//! return ranked next-token candidates. The n-gram `PredictionTable` and
//! the model-backed `ModelScorer` both implement it, so the same greedy
//! and beam search code drives either backend.
//!
//! Score convention: candidate scores are probabilities and beam search
//! ranks hypotheses by the raw sum of their natural logarithms (no length
//! normalization).

/// Bounded best-first beam search.
pub mod beam;

/// Deterministic single-path decoding.
pub mod greedy;

/// Table-backed and model-backed scorers.
pub mod scorer;

/// Batch generation of (truth, prediction) pairs.
pub mod template;

pub use beam::{BeamOutcome, BeamSearchDecoder, Hypothesis};
pub use greedy::GreedyDecoder;
pub use scorer::{ModelScorer, Scorer};
pub use template::{Template, generate_templates};

use crate::{PAD_TOKEN, TokenStream};

/// A decoding strategy.
///
/// Implementations are immutable once built and can be shared between
/// threads decoding different examples.
pub trait Decoder: Send + Sync {
	/// Generates ranked sequences, best first. Every sequence starts with
	/// the seed tokens.
	fn decode(&self, scorer: &dyn Scorer, seed: &[String]) -> Vec<TokenStream>;
}

/// Last `width` tokens of the seed, left-padded with `<pad>`.
pub(crate) fn initial_window(seed: &[String], width: usize) -> Vec<String> {
	let start = seed.len().saturating_sub(width);
	let mut window = vec![PAD_TOKEN.to_owned(); width - (seed.len() - start)];
	window.extend_from_slice(&seed[start..]);
	window
}

/// Window shifted by one token: oldest dropped, `token` appended.
pub(crate) fn slide(window: &[String], token: &str) -> Vec<String> {
	window
		.iter()
		.skip(1)
		.cloned()
		.chain(std::iter::once(token.to_owned()))
		.collect()
}
