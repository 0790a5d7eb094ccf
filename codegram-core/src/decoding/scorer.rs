use crate::model::{Candidate, PredictionTable};
use crate::vocab::Vocabulary;
use crate::UNKNOWN_TOKEN;

/// Next-token scoring capability consumed by the decoders.
pub trait Scorer: Sync {
	/// At most `top_k` candidates following `window`, best first.
	///
	/// Returns `None` when nothing can be predicted from this window.
	fn top_candidates(&self, window: &[String], top_k: usize) -> Option<Vec<Candidate>>;
}

impl Scorer for PredictionTable {
	fn top_candidates(&self, window: &[String], top_k: usize) -> Option<Vec<Candidate>> {
		let candidates = self.predict_next(window)?;
		if candidates.is_empty() {
			return None;
		}
		Some(candidates.iter().take(top_k).cloned().collect())
	}
}

/// Scorer backed by a neural model's per-step output.
///
/// The window is encoded through the vocabulary and handed to `forward`,
/// which returns one logit per vocabulary id. Logits are turned into
/// probabilities with a softmax.
pub struct ModelScorer<F> {
	vocabulary: Vocabulary,
	forward: F,
}

impl<F> ModelScorer<F>
where
	F: Fn(&[u32]) -> Vec<f32> + Sync,
{
	pub fn new(vocabulary: Vocabulary, forward: F) -> Self {
		Self { vocabulary, forward }
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}
}

impl<F> Scorer for ModelScorer<F>
where
	F: Fn(&[u32]) -> Vec<f32> + Sync,
{
	fn top_candidates(&self, window: &[String], top_k: usize) -> Option<Vec<Candidate>> {
		let logits = (self.forward)(&self.vocabulary.encode_all(window));
		if top_k == 0 {
			return None;
		}

		let mut ranked: Vec<(usize, f64)> = softmax(&logits)?.into_iter().enumerate().collect();
		ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

		Some(
			ranked
				.into_iter()
				.take(top_k)
				.map(|(id, probability)| {
					let token = self.vocabulary.decode(id as u32).unwrap_or(UNKNOWN_TOKEN);
					Candidate::new(probability, token)
				})
				.collect(),
		)
	}
}

/// Numerically stable softmax.
///
/// `None` for empty logits or when the largest logit is not finite.
/// NaN logits get probability zero.
fn softmax(logits: &[f32]) -> Option<Vec<f64>> {
	let max = logits.iter().copied().filter(|l| !l.is_nan()).fold(f32::NEG_INFINITY, f32::max) as f64;
	if !max.is_finite() {
		return None;
	}
	let exps: Vec<f64> = logits
		.iter()
		.map(|&l| if l.is_nan() { 0.0 } else { (l as f64 - max).exp() })
		.collect();
	let sum: f64 = exps.iter().sum();
	Some(exps.into_iter().map(|e| e / sum).collect())
}
