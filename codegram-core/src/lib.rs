//! N-gram based source code completion library.
//!
//! This crate provides the pieces needed to predict and generate code
//! token sequences:
//! - Per-order n-gram counting over tokenized source lines
//! - Interpolated Kneser-Ney and maximum likelihood estimators
//! - A read-only prediction table mapping contexts to ranked candidates
//! - Greedy and beam search decoders over any next-token scorer
//!
//! Tokenization is not handled here: the crate consumes token streams
//! produced by an external lexer (one stream per line in corpus files).

/// N-gram counting, probability estimation and the prediction table.
pub mod model;

/// Search-based decoding over any scorer (n-gram table or neural model).
pub mod decoding;

/// Training and decoding parameters.
pub mod config;

/// Token to integer index used by model-backed scorers.
pub mod vocab;

/// Error type shared by the crate.
pub mod error;

/// Corpus and file helpers (reading token streams, cache paths).
pub mod io;

pub use error::{ModelError, Result};

/// Padding token used to fill contexts near the start of a stream.
pub const PAD_TOKEN: &str = "<pad>";

/// Out-of-vocabulary token, also used as the zero-probability placeholder
/// when a scorer returns fewer candidates than requested.
pub const UNKNOWN_TOKEN: &str = "<idf>";

/// Tokens marking a natural stopping point of a generated statement.
pub const TERMINATORS: [&str; 3] = [";", "{", "}"];

/// One tokenized source unit.
pub type TokenStream = Vec<String>;

/// Returns `true` if `token` ends a generated statement.
pub fn is_terminator(token: &str) -> bool {
	TERMINATORS.contains(&token)
}
