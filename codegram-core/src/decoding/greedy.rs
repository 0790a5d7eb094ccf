use log::debug;

use super::scorer::Scorer;
use super::{Decoder, initial_window};
use crate::error::{ModelError, Result};
use crate::{TokenStream, is_terminator};

/// Always follows the single most probable next token.
///
/// Deterministic: the same scorer and seed give the same sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct GreedyDecoder {
	context_size: usize,
	max_len: usize,
}

impl GreedyDecoder {
	/// # Parameters
	/// - `context_size`: model order; the window holds the last
	///   `context_size - 1` tokens.
	/// - `max_len`: generation stops once the output (seed included) is
	///   longer than this.
	///
	/// # Errors
	/// `InvalidConfiguration` when `context_size < 2` or `max_len == 0`.
	pub fn new(context_size: usize, max_len: usize) -> Result<Self> {
		if context_size < 2 {
			return Err(ModelError::invalid(format!("context size must be at least 2, got {context_size}")));
		}
		if max_len == 0 {
			return Err(ModelError::invalid("max length must be positive"));
		}
		Ok(Self { context_size, max_len })
	}

	pub fn context_size(&self) -> usize {
		self.context_size
	}

	pub fn max_len(&self) -> usize {
		self.max_len
	}

	/// Extends the seed one best token at a time.
	///
	/// # Behavior
	/// - Short seeds are left-padded with `<pad>` to fill the window.
	/// - Stops after a terminator token (`;`, `{`, `}`), when the length cap
	///   is exceeded, or when the window is unknown to the scorer. In the
	///   last case the seed plus what was generated so far is returned.
	pub fn generate(&self, scorer: &dyn Scorer, seed: &[String]) -> TokenStream {
		let mut output = seed.to_vec();
		let mut window = initial_window(seed, self.context_size - 1);

		while let Some(best) = scorer.top_candidates(&window, 1).and_then(|c| c.into_iter().next()) {
			window.remove(0);
			window.push(best.token.clone());
			output.push(best.token);

			if output.last().is_some_and(|token| is_terminator(token)) || output.len() > self.max_len {
				break;
			}
		}

		debug!("greedy: {} seed tokens, {} generated", seed.len(), output.len() - seed.len());
		output
	}
}

impl Decoder for GreedyDecoder {
	fn decode(&self, scorer: &dyn Scorer, seed: &[String]) -> Vec<TokenStream> {
		vec![self.generate(scorer, seed)]
	}
}
