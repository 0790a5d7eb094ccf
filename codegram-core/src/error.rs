use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building, persisting or configuring a model.
///
/// Lookup misses are never errors: a context that was not observed during
/// training yields `None` from the table and the decoders recover locally.
#[derive(Debug, Error)]
pub enum ModelError {
	#[error("invalid configuration: {message}")]
	InvalidConfiguration { message: String },

	/// A count table needed by the Kneser-Ney recursion has no entry for
	/// `context`. Only happens when the tables do not come from one corpus.
	#[error("context not found at order {order}: \"{context}\"")]
	ContextNotFound { order: usize, context: String },

	#[error("order mismatch: expected {expected}, got {found}")]
	OrderMismatch { expected: usize, found: usize },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] postcard::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl ModelError {
	#[must_use]
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidConfiguration {
			message: message.into(),
		}
	}

	#[must_use]
	pub(crate) fn context_not_found(order: usize, context: impl Into<String>) -> Self {
		Self::ContextNotFound {
			order,
			context: context.into(),
		}
	}
}
