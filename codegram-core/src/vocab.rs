use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::{PAD_TOKEN, TokenStream, UNKNOWN_TOKEN};

/// Fixed token ↔ id mapping used by model-backed scorers.
///
/// Id 0 is always `<pad>` and id 1 is always `<idf>` (unknown token).
/// The n-gram model works on strings and only needs the vocabulary to
/// collapse rare tokens into `<idf>`.
///
/// Persisted as a JSON object `{ "token": id, ... }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, u32>", into = "HashMap<String, u32>")]
pub struct Vocabulary {
	tokens: Vec<String>,
	ids: HashMap<String, u32>,
}

impl Vocabulary {
	pub const PAD_ID: u32 = 0;
	pub const UNKNOWN_ID: u32 = 1;

	/// Keeps the `size` most frequent tokens of a corpus.
	///
	/// Ties are broken by token so the result does not depend on the
	/// corpus iteration order.
	pub fn build(corpus: &[TokenStream], size: usize) -> Self {
		let mut frequencies: HashMap<&str, usize> = HashMap::new();
		for token in corpus.iter().flatten() {
			*frequencies.entry(token.as_str()).or_insert(0) += 1;
		}

		let mut ranked: Vec<(&str, usize)> = frequencies
			.into_iter()
			.filter(|(token, _)| *token != PAD_TOKEN && *token != UNKNOWN_TOKEN)
			.collect();
		ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

		let mut tokens = vec![PAD_TOKEN.to_owned(), UNKNOWN_TOKEN.to_owned()];
		tokens.extend(ranked.into_iter().take(size).map(|(token, _)| token.to_owned()));
		Self::from_tokens(tokens)
	}

	fn from_tokens(tokens: Vec<String>) -> Self {
		let ids = tokens
			.iter()
			.enumerate()
			.map(|(id, token)| (token.clone(), id as u32))
			.collect();
		Self { tokens, ids }
	}

	/// Reads a vocabulary from its JSON form.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		Self::from_json(&fs::read_to_string(path)?)
	}

	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		fs::write(path, self.to_json()?)?;
		Ok(())
	}

	/// Id of a token, `<idf>` for unknown tokens.
	pub fn encode(&self, token: &str) -> u32 {
		self.ids.get(token).copied().unwrap_or(Self::UNKNOWN_ID)
	}

	pub fn encode_all(&self, tokens: &[String]) -> Vec<u32> {
		tokens.iter().map(|token| self.encode(token)).collect()
	}

	/// Token of an id, `None` when out of range.
	pub fn decode(&self, id: u32) -> Option<&str> {
		self.tokens.get(id as usize).map(String::as_str)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.ids.contains_key(token)
	}

	/// Copies a stream, replacing unknown tokens with `<idf>`.
	pub fn replace_unknown(&self, stream: &[String]) -> TokenStream {
		stream
			.iter()
			.map(|token| {
				if self.contains(token) {
					token.clone()
				} else {
					UNKNOWN_TOKEN.to_owned()
				}
			})
			.collect()
	}

	/// Number of tokens, reserved ones included.
	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}

impl TryFrom<HashMap<String, u32>> for Vocabulary {
	type Error = ModelError;

	/// Rebuilds the id-ordered token list, rejecting gaps, duplicate ids
	/// and misplaced reserved tokens.
	fn try_from(ids: HashMap<String, u32>) -> Result<Self> {
		let mut tokens = vec![None; ids.len()];
		for (token, &id) in &ids {
			let slot = tokens
				.get_mut(id as usize)
				.ok_or_else(|| ModelError::invalid(format!("vocabulary id {id} of '{token}' is out of range")))?;
			if slot.replace(token.clone()).is_some() {
				return Err(ModelError::invalid(format!("vocabulary id {id} is used twice")));
			}
		}
		let tokens: Vec<String> = tokens.into_iter().flatten().collect();

		if tokens.first().map(String::as_str) != Some(PAD_TOKEN)
			|| tokens.get(1).map(String::as_str) != Some(UNKNOWN_TOKEN)
		{
			return Err(ModelError::invalid(format!(
				"vocabulary must map {PAD_TOKEN} to 0 and {UNKNOWN_TOKEN} to 1"
			)));
		}
		Ok(Self { tokens, ids })
	}
}

impl From<Vocabulary> for HashMap<String, u32> {
	fn from(vocabulary: Vocabulary) -> Self {
		vocabulary.ids
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus(lines: &[&str]) -> Vec<TokenStream> {
		lines
			.iter()
			.map(|line| line.split_whitespace().map(str::to_owned).collect())
			.collect()
	}

	#[test]
	fn reserves_pad_and_unknown() {
		let vocabulary = Vocabulary::build(&corpus(&["int x ;", "int y ;"]), 10);
		assert_eq!(vocabulary.encode(PAD_TOKEN), Vocabulary::PAD_ID);
		assert_eq!(vocabulary.encode(UNKNOWN_TOKEN), Vocabulary::UNKNOWN_ID);
		assert_eq!(vocabulary.decode(2), Some(";"));
		assert_eq!(vocabulary.decode(3), Some("int"));
		assert_eq!(vocabulary.len(), 6);
	}

	#[test]
	fn keeps_most_frequent_tokens() {
		let vocabulary = Vocabulary::build(&corpus(&["a a a b b c"]), 2);
		assert!(vocabulary.contains("a") && vocabulary.contains("b"));
		assert_eq!(vocabulary.encode("c"), Vocabulary::UNKNOWN_ID);
		assert_eq!(vocabulary.replace_unknown(&corpus(&["c a"])[0]), vec![UNKNOWN_TOKEN, "a"]);
	}

	#[test]
	fn reads_the_json_index() {
		let vocabulary = Vocabulary::from_json(r#"{"<pad>": 0, "<idf>": 1, "public": 2, ";": 3}"#).unwrap();
		assert_eq!(vocabulary.encode_all(&corpus(&["public ; class"])[0]), vec![2, 3, 1]);
		assert_eq!(Vocabulary::from_json(&vocabulary.to_json().unwrap()).unwrap(), vocabulary);
	}

	#[test]
	fn rejects_malformed_indexes() {
		assert!(Vocabulary::from_json(r#"{"<pad>": 0, "<idf>": 1, "x": 5}"#).is_err());
		assert!(Vocabulary::from_json(r#"{"<pad>": 0, "<idf>": 1, "x": 1}"#).is_err());
		assert!(Vocabulary::from_json(r#"{"<idf>": 0, "<pad>": 1}"#).is_err());
	}
}
