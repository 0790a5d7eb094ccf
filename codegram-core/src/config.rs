use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoding::{BeamSearchDecoder, Decoder, GreedyDecoder};
use crate::error::{ModelError, Result};
use crate::model::PredictionTable;
use crate::model::kneser_ney::DEFAULT_DISCOUNT;

/// Probability estimator used to turn counts into a prediction table.
///
/// # Variants
/// - `KneserNey { discount }`: interpolated Kneser-Ney over orders `2..=order`.
/// - `MaximumLikelihood`: plain relative frequency at the single top order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
	KneserNey { discount: f64 },
	MaximumLikelihood,
}

impl Smoothing {
	/// Short tag used in cache file names.
	pub fn tag(&self) -> &'static str {
		match self {
			Smoothing::KneserNey { .. } => "kn",
			Smoothing::MaximumLikelihood => "mle",
		}
	}
}

impl Default for Smoothing {
	fn default() -> Self {
		Smoothing::KneserNey {
			discount: DEFAULT_DISCOUNT,
		}
	}
}

/// Parameters of a training run.
///
/// # Invariants
/// - `order >= 2`, and `order >= 3` with Kneser-Ney smoothing
/// - the Kneser-Ney discount lies in `[0.0, 1.0)`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
	/// Highest n-gram order (context length + 1).
	pub order: usize,

	/// Estimator to use.
	pub smoothing: Smoothing,

	/// Prepend `order - 1` padding tokens to each stream so the first
	/// tokens of a line get a full context.
	pub pad_streams: bool,

	/// Number of corpus shards counted in parallel (0 = from CPU count).
	pub shards: usize,
}

impl Default for TrainConfig {
	fn default() -> Self {
		Self {
			order: 5,
			smoothing: Smoothing::default(),
			pad_streams: true,
			shards: 0,
		}
	}
}

impl TrainConfig {
	/// Creates a Kneser-Ney configuration of the given order.
	///
	/// # Errors
	/// Returns an error if the order is too small for Kneser-Ney.
	pub fn new(order: usize) -> Result<Self> {
		let config = Self {
			order,
			..Self::default()
		};
		config.validate()?;
		Ok(config)
	}

	/// Switches to maximum likelihood estimation (no smoothing).
	pub fn without_smoothing(mut self) -> Self {
		self.smoothing = Smoothing::MaximumLikelihood;
		self
	}

	/// Sets the Kneser-Ney discount.
	///
	/// # Errors
	/// Returns an error if the value is outside `[0.0, 1.0)` or if the
	/// configuration does not use Kneser-Ney smoothing.
	pub fn set_discount(&mut self, discount: f64) -> Result<()> {
		match &mut self.smoothing {
			Smoothing::KneserNey { discount: d } => {
				check_discount(discount)?;
				*d = discount;
				Ok(())
			}
			Smoothing::MaximumLikelihood => Err(ModelError::invalid(
				"discount only applies to Kneser-Ney smoothing",
			)),
		}
	}

	/// Checks every invariant. Called before any computation starts.
	pub fn validate(&self) -> Result<()> {
		match self.smoothing {
			Smoothing::KneserNey { discount } => {
				if self.order < 3 {
					return Err(ModelError::invalid(format!(
						"Kneser-Ney smoothing needs order >= 3, got {}",
						self.order
					)));
				}
				check_discount(discount)
			}
			Smoothing::MaximumLikelihood if self.order < 2 => Err(ModelError::invalid(format!(
				"order must be >= 2, got {}",
				self.order
			))),
			Smoothing::MaximumLikelihood => Ok(()),
		}
	}
}

pub(crate) fn check_discount(discount: f64) -> Result<()> {
	if !(0.0..1.0).contains(&discount) {
		return Err(ModelError::invalid(format!(
			"discount must be in [0.0, 1.0), got {discount}"
		)));
	}
	Ok(())
}

/// Decoding strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMethod {
	#[default]
	Greedy,
	Beam,
}

impl std::str::FromStr for DecodeMethod {
	type Err = ModelError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"greedy" => Ok(DecodeMethod::Greedy),
			"beam" => Ok(DecodeMethod::Beam),
			other => Err(ModelError::invalid(format!(
				"invalid method '{other}', choose 'greedy' or 'beam'"
			))),
		}
	}
}

/// Parameters of a generation request.
///
/// Loaded from JSON by the CLI, built from query parameters by the server.
/// Missing fields take their default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
	pub method: DecodeMethod,

	/// Width of the sliding window, counted like an n-gram order: the
	/// scorer sees the last `context_size - 1` tokens.
	pub context_size: usize,

	/// Maximum length of the output (seed included).
	pub max_len: usize,

	/// Candidates expanded per beam node.
	pub beam_width: usize,

	/// Number of sequences returned by beam search.
	pub top_k_pred: usize,

	/// Maximum number of nodes pushed during one beam search.
	pub max_nodes: usize,
}

impl Default for DecodeConfig {
	fn default() -> Self {
		Self {
			method: DecodeMethod::Greedy,
			context_size: 5,
			max_len: 15,
			beam_width: 5,
			top_k_pred: 1,
			max_nodes: crate::decoding::beam::DEFAULT_MAX_NODES,
		}
	}
}

impl DecodeConfig {
	/// Reads a configuration from a JSON file.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let text = fs::read_to_string(path)?;
		Ok(serde_json::from_str(&text)?)
	}

	/// Builds the decoder described by this configuration.
	///
	/// # Errors
	/// Returns an error on invalid sizes (see each decoder's constructor).
	pub fn build(&self) -> Result<Box<dyn Decoder>> {
		Ok(match self.method {
			DecodeMethod::Greedy => Box::new(GreedyDecoder::new(self.context_size, self.max_len)?),
			DecodeMethod::Beam => Box::new(
				BeamSearchDecoder::new(self.context_size, self.max_len, self.beam_width, self.top_k_pred)?
					.with_max_nodes(self.max_nodes)?,
			),
		})
	}

	/// Builds the decoder after checking it can query `table`.
	///
	/// # Errors
	/// Returns an error if `context_size` is below the table order: the
	/// window would be shorter than every stored context and nothing could
	/// ever be predicted.
	pub fn build_for(&self, table: &PredictionTable) -> Result<Box<dyn Decoder>> {
		if self.context_size < table.order() {
			return Err(ModelError::invalid(format!(
				"context size {} is smaller than the order {} of the table",
				self.context_size,
				table.order()
			)));
		}
		self.build()
	}
}
