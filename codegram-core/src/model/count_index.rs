use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};

use super::ngram_count::{CountTable, check_stream};
use crate::error::{ModelError, Result};
use crate::TokenStream;

/// Shards per CPU when the shard count is picked automatically.
const SHARDS_PER_CPU: usize = 8;

/// Count tables for every order from 2 up to `max_order`.
///
/// This is the raw input of the estimators. It is filled once from a
/// corpus and then only read.
///
/// # Invariants
/// - `max_order >= 2`
/// - `tables` holds exactly one table per order in `2..=max_order`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContextCountIndex {
	max_order: usize,
	tables: BTreeMap<usize, CountTable>,
}

impl ContextCountIndex {
	/// Creates an index with one empty table per order.
	///
	/// # Errors
	/// Returns an error if `max_order < 2`.
	pub fn new(max_order: usize) -> Result<Self> {
		if max_order < 2 {
			return Err(ModelError::invalid(format!("maximum order must be >= 2, got {max_order}")));
		}
		let mut tables = BTreeMap::new();
		for n in 2..=max_order {
			tables.insert(n, CountTable::new(n)?);
		}
		Ok(Self { max_order, tables })
	}

	/// Assembles an index from already counted tables, in any order.
	///
	/// # Errors
	/// Returns an error unless the tables cover every order from 2 to the
	/// highest one exactly once.
	pub fn from_tables(tables: Vec<CountTable>) -> Result<Self> {
		let mut by_order = BTreeMap::new();
		for table in tables {
			let order = table.order();
			if by_order.insert(order, table).is_some() {
				return Err(ModelError::invalid(format!("duplicate count table of order {order}")));
			}
		}
		let max_order = by_order.keys().next_back().copied().unwrap_or(0);
		if max_order < 2 || by_order.len() != max_order - 1 {
			return Err(ModelError::invalid(format!(
				"count tables must cover orders 2..={max_order} exactly"
			)));
		}
		Ok(Self {
			max_order,
			tables: by_order,
		})
	}

	/// Counts every n-gram of orders `2..=max_order` in a corpus.
	pub fn from_corpus(corpus: &[TokenStream], max_order: usize) -> Result<Self> {
		let mut index = Self::new(max_order)?;
		for stream in corpus {
			index.add_stream(stream)?;
		}
		Ok(index)
	}

	/// Counts a corpus in parallel shards, then merges the partial indexes.
	///
	/// # Parameters
	/// - `corpus`: the token streams.
	/// - `max_order`: highest order to count.
	/// - `shards`: number of shards, `0` picks `cpus * 8`.
	///
	/// # Behavior
	/// - Splits the corpus into contiguous chunks.
	/// - Counts each chunk on its own thread.
	/// - Merges partial indexes as they arrive.
	///
	/// # Notes
	/// - Merging is a plain sum, so the result does not depend on the shard
	///   count or on the order in which shards finish.
	pub fn from_corpus_sharded(corpus: &[TokenStream], max_order: usize, shards: usize) -> Result<Self> {
		let mut final_index = Self::new(max_order)?;
		if corpus.is_empty() {
			return Ok(final_index);
		}

		let shards = if shards == 0 { num_cpus::get() * SHARDS_PER_CPU } else { shards };
		let chunk_size = corpus.len().div_ceil(shards);
		debug!("counting {} streams in chunks of {}", corpus.len(), chunk_size);

		thread::scope(|scope| -> Result<Self> {
			let (tx, rx) = mpsc::channel();
			for chunk in corpus.chunks(chunk_size) {
				let tx = tx.clone();
				scope.spawn(move || {
					// The receiver outlives every sender inside the scope
					let _ = tx.send(Self::from_corpus(chunk, max_order));
				});
			}
			drop(tx);

			for partial_index in rx.iter() {
				final_index.merge(&partial_index?)?;
			}
			Ok(final_index)
		})
	}

	/// Adds the n-grams of every order of one stream.
	///
	/// # Errors
	/// Returns an error, with nothing counted, if a token is empty or
	/// contains whitespace.
	pub fn add_stream(&mut self, tokens: &[String]) -> Result<()> {
		check_stream(tokens)?;
		for table in self.tables.values_mut() {
			table.add_stream(tokens)?;
		}
		Ok(())
	}

	/// Highest counted order.
	pub fn max_order(&self) -> usize {
		self.max_order
	}

	/// Count table of one order.
	pub fn table(&self, order: usize) -> Option<&CountTable> {
		self.tables.get(&order)
	}

	/// Count of a space-joined n-gram, looked up in the table of its order.
	pub fn count(&self, order: usize, ngram: &str) -> Option<usize> {
		self.tables.get(&order)?.count(ngram)
	}

	/// Iterates over the tables from order 2 upward.
	pub fn tables(&self) -> impl Iterator<Item = &CountTable> {
		self.tables.values()
	}

	/// Sums another index into this one.
	///
	/// # Errors
	/// Returns an error if the maximum orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.max_order != other.max_order {
			return Err(ModelError::OrderMismatch {
				expected: self.max_order,
				found: other.max_order,
			});
		}
		for (order, table) in &other.tables {
			match self.tables.get_mut(order) {
				Some(existing) => existing.merge(table)?,
				None => {
					self.tables.insert(*order, table.clone());
				}
			}
		}
		Ok(())
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
	fn builds_one_table_per_order() {
		let index = ContextCountIndex::from_corpus(&corpus(&["a b ;", "a b ;", "a c ;"]), 3).unwrap();
		assert_eq!(index.max_order(), 3);
		assert_eq!(index.tables().map(CountTable::order).collect::<Vec<_>>(), vec![2, 3]);
		assert_eq!(index.count(2, "a b"), Some(2));
		assert_eq!(index.count(3, "a b ;"), Some(2));
		assert_eq!(index.count(3, "a c ;"), Some(1));
		assert_eq!(index.count(4, "a b ; x"), None);
	}

	#[test]
	fn empty_corpus_gives_empty_tables() {
		let index = ContextCountIndex::from_corpus_sharded(&[], 4, 0).unwrap();
		assert!(index.tables().all(CountTable::is_empty));
		assert_eq!(index.tables().count(), 3);
	}

	#[test]
	fn sharded_counting_matches_sequential() {
		let data = corpus(&["int i = 0 ;", "i ++ ;", "for ( int i = 0 ;", "return i ;", "}"]);
		let sequential = ContextCountIndex::from_corpus(&data, 4).unwrap();
		for shards in [1, 2, 3, 16] {
			let sharded = ContextCountIndex::from_corpus_sharded(&data, 4, shards).unwrap();
			assert_eq!(sharded, sequential, "shards = {shards}");
		}
	}

	#[test]
	fn assembles_from_complete_table_sets_only() {
		let data = corpus(&["a b c d"]);
		let two = CountTable::from_corpus(2, &data).unwrap();
		let three = CountTable::from_corpus(3, &data).unwrap();
		let four = CountTable::from_corpus(4, &data).unwrap();

		let index = ContextCountIndex::from_tables(vec![four.clone(), two.clone(), three]).unwrap();
		assert_eq!(index, ContextCountIndex::from_corpus(&data, 4).unwrap());

		assert!(ContextCountIndex::from_tables(vec![two.clone(), four]).is_err());
		assert!(ContextCountIndex::from_tables(vec![two.clone(), two]).is_err());
		assert!(ContextCountIndex::from_tables(Vec::new()).is_err());
	}

	#[test]
	fn rejects_small_orders_and_mismatched_merges() {
		assert!(ContextCountIndex::new(1).is_err());
		let mut three = ContextCountIndex::new(3).unwrap();
		let four = ContextCountIndex::new(4).unwrap();
		assert!(three.merge(&four).is_err());
	}
}
