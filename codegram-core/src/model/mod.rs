//! Top-level module for the n-gram language model.
//!
//! Training flows leaves first:
//! - Fixed-order count tables (`CountTable`)
//! - Count tables of every order (`ContextCountIndex`)
//! - Probability estimators (`KneserNeyEstimator`, `MaximumLikelihoodEstimator`)
//! - The resulting read-only lookup structure (`PredictionTable`)
//! - The training entry points (`train`, `load_or_train`)

/// Occurrence counts of a single n-gram order.
pub mod ngram_count;

/// Count tables for orders `2..=N`, with parallel sharded counting.
pub mod count_index;

/// Interpolated Kneser-Ney smoothing.
pub mod kneser_ney;

/// Unsmoothed relative-frequency estimation.
pub mod mle;

/// Context → ranked candidates table, queried by decoders.
pub mod prediction_table;

/// Training pipeline and on-disk cache.
pub mod trainer;

pub use count_index::ContextCountIndex;
pub use kneser_ney::KneserNeyEstimator;
pub use mle::MaximumLikelihoodEstimator;
pub use ngram_count::CountTable;
pub use prediction_table::{Candidate, PredictionTable};
pub use trainer::{load_or_train, pad_stream, train, train_with_vocabulary};
