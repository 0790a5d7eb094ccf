use std::sync::mpsc;
use std::thread;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::Decoder;
use super::scorer::Scorer;
use crate::TokenStream;

/// A held-out line and what a decoder produced from its prefix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
	pub truth: TokenStream,
	pub predictions: Vec<TokenStream>,
}

impl Template {
	/// Whether the best prediction reproduces the line exactly.
	pub fn is_exact(&self) -> bool {
		self.predictions.first() == Some(&self.truth)
	}
}

/// Decodes the prefix of every stream, in parallel.
///
/// # Parameters
/// - `scorer`, `decoder`: shared by every worker thread.
/// - `streams`: the held-out lines.
/// - `seed_len`: number of leading tokens of each line given as seed.
///
/// # Returns
/// One template per stream, in input order.
///
/// # Notes
/// Streams are split in one chunk per CPU. Each example is decoded
/// independently, so the output does not depend on the chunking.
pub fn generate_templates(
	scorer: &dyn Scorer,
	decoder: &dyn Decoder,
	streams: &[TokenStream],
	seed_len: usize,
) -> Vec<Template> {
	if streams.is_empty() {
		return Vec::new();
	}

	let chunk_size = streams.len().div_ceil(num_cpus::get());
	info!("decoding {} streams in chunks of {}", streams.len(), chunk_size);

	let mut parts: Vec<(usize, Vec<Template>)> = thread::scope(|scope| {
		let (tx, rx) = mpsc::channel();
		for (position, chunk) in streams.chunks(chunk_size).enumerate() {
			let tx = tx.clone();
			scope.spawn(move || {
				let templates = chunk
					.iter()
					.map(|truth| Template {
						predictions: decoder.decode(scorer, &truth[..seed_len.min(truth.len())]),
						truth: truth.clone(),
					})
					.collect::<Vec<_>>();
				let _ = tx.send((position, templates));
			});
		}
		drop(tx);
		rx.iter().collect()
	});

	parts.sort_by_key(|(position, _)| *position);
	let templates: Vec<Template> = parts.into_iter().flat_map(|(_, templates)| templates).collect();
	debug!(
		"{} of {} templates exactly reproduced",
		templates.iter().filter(|t| t.is_exact()).count(),
		templates.len()
	);
	templates
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TrainConfig;
	use crate::decoding::{BeamSearchDecoder, GreedyDecoder};
	use crate::model::train;

	fn tokens(line: &str) -> Vec<String> {
		line.split_whitespace().map(str::to_owned).collect()
	}

	#[test]
	fn keeps_input_order() {
		let corpus: Vec<_> = ["a b ;", "a b ;", "a c ;", "x y ;"].iter().map(|l| tokens(l)).collect();
		let table = train(&corpus, &TrainConfig::new(3).unwrap()).unwrap();
		let decoder = GreedyDecoder::new(3, 15).unwrap();

		let held_out: Vec<_> = (0..50).map(|i| if i % 2 == 0 { tokens("a b ;") } else { tokens("x y ;") }).collect();
		let templates = generate_templates(&table, &decoder, &held_out, 1);

		assert_eq!(templates.len(), 50);
		for (template, truth) in templates.iter().zip(&held_out) {
			assert_eq!(&template.truth, truth);
			assert!(template.is_exact());
		}
	}

	#[test]
	fn beam_templates_hold_ranked_predictions() {
		let corpus: Vec<_> = ["a b ;", "a b ;", "a c ;"].iter().map(|l| tokens(l)).collect();
		let table = train(&corpus, &TrainConfig::new(3).unwrap()).unwrap();
		let decoder = BeamSearchDecoder::new(3, 15, 2, 2).unwrap();

		let templates = generate_templates(&table, &decoder, &[tokens("a c ;")], 1);
		assert_eq!(templates[0].predictions, vec![tokens("a b ;"), tokens("a c ;")]);
		assert!(!templates[0].is_exact());
	}

	#[test]
	fn empty_input_gives_no_templates() {
		let decoder = GreedyDecoder::new(3, 15).unwrap();
		let table = train(&[], &TrainConfig::new(3).unwrap()).unwrap();
		assert!(generate_templates(&table, &decoder, &[], 2).is_empty());
	}
}
