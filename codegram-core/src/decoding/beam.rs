use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, warn};

use super::scorer::Scorer;
use super::{Decoder, initial_window, slide};
use crate::error::{ModelError, Result};
use crate::model::Candidate;
use crate::{PAD_TOKEN, TokenStream, UNKNOWN_TOKEN, is_terminator};

/// Number of nodes a single search may push before it is cut short.
pub const DEFAULT_MAX_NODES: usize = 1000;

/// One expanded token, linked to its parent by arena index.
#[derive(Debug)]
struct BeamNode {
	window: Vec<String>,
	/// `None` for the root.
	token: Option<String>,
	parent: Option<usize>,
	log_prob: f64,
	/// Generated tokens from the root to this node.
	length: usize,
}

/// Frontier entry. The heap pops the best score first; on equal scores
/// the entry pushed first wins.
#[derive(Debug)]
struct Frontier {
	score: f64,
	sequence: usize,
	node: usize,
}

impl PartialEq for Frontier {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Frontier {
	fn cmp(&self, other: &Self) -> Ordering {
		self.score
			.total_cmp(&other.score)
			.then_with(|| other.sequence.cmp(&self.sequence))
	}
}

/// A decoded sequence and its accumulated log-probability.
#[derive(Clone, Debug, PartialEq)]
pub struct Hypothesis {
	/// Seed followed by the generated tokens.
	pub tokens: TokenStream,
	pub log_prob: f64,
	/// `false` when taken from the frontier because nothing completed.
	pub completed: bool,
}

/// Result of one beam search.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamOutcome {
	/// Best first, at most `top_k_pred` of them.
	pub hypotheses: Vec<Hypothesis>,
	/// Set when the node budget stopped the search early.
	pub budget_exhausted: bool,
	/// Nodes pushed on the frontier, root included.
	pub nodes_pushed: usize,
	/// Nodes the scorer extended with children. Dead branches are not
	/// counted.
	pub expansions: usize,
}

/// Best-first search keeping `beam_width` successors per expanded node.
///
/// A node is complete when its last token is a terminator or when the
/// output (seed included) is longer than `max_len`. The search stops once
/// `top_k_pred` nodes completed, when the frontier empties, or when more
/// than `max_nodes` nodes were pushed.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamSearchDecoder {
	context_size: usize,
	max_len: usize,
	beam_width: usize,
	top_k_pred: usize,
	max_nodes: usize,
}

impl BeamSearchDecoder {
	/// # Errors
	/// `InvalidConfiguration` when:
	/// - `context_size < 2`, `max_len == 0`, `beam_width == 0` or
	///   `top_k_pred == 0`;
	/// - `beam_width < 2` and `top_k_pred > beam_width` (a single-path beam
	///   cannot produce more than one result).
	pub fn new(context_size: usize, max_len: usize, beam_width: usize, top_k_pred: usize) -> Result<Self> {
		if context_size < 2 {
			return Err(ModelError::invalid(format!("context size must be at least 2, got {context_size}")));
		}
		if max_len == 0 {
			return Err(ModelError::invalid("max length must be positive"));
		}
		if beam_width == 0 || top_k_pred == 0 {
			return Err(ModelError::invalid("beam width and prediction count must be positive"));
		}
		if beam_width < 2 && top_k_pred > beam_width {
			return Err(ModelError::invalid(format!(
				"a beam of width {beam_width} cannot return {top_k_pred} predictions"
			)));
		}

		Ok(Self {
			context_size,
			max_len,
			beam_width,
			top_k_pred,
			max_nodes: DEFAULT_MAX_NODES,
		})
	}

	/// Overrides the node budget.
	pub fn with_max_nodes(mut self, max_nodes: usize) -> Result<Self> {
		if max_nodes == 0 {
			return Err(ModelError::invalid("node budget must be positive"));
		}
		self.max_nodes = max_nodes;
		Ok(self)
	}

	pub fn beam_width(&self) -> usize {
		self.beam_width
	}

	pub fn top_k_pred(&self) -> usize {
		self.top_k_pred
	}

	pub fn max_nodes(&self) -> usize {
		self.max_nodes
	}

	/// Runs the search from `seed`.
	///
	/// # Behavior
	/// - Each expansion asks the scorer for `beam_width` candidates. Missing
	///   ones are filled with `<idf>` at probability zero, which scores
	///   negative infinity and is only ever popped last.
	/// - A window unknown to the scorer ends that branch.
	/// - Completed hypotheses are returned best score first. When none
	///   completed, the best frontier nodes are returned instead.
	/// - `<pad>` tokens never appear in the returned sequences.
	pub fn search(&self, scorer: &dyn Scorer, seed: &[String]) -> BeamOutcome {
		let mut arena = vec![BeamNode {
			window: initial_window(seed, self.context_size - 1),
			token: None,
			parent: None,
			log_prob: 0.0,
			length: 0,
		}];
		let mut frontier = BinaryHeap::new();
		frontier.push(Frontier {
			score: 0.0,
			sequence: 0,
			node: 0,
		});

		let mut nodes_pushed = 1;
		let mut expansions = 0;
		let mut completed: Vec<usize> = Vec::new();
		let mut budget_exhausted = false;

		loop {
			if nodes_pushed > self.max_nodes {
				budget_exhausted = true;
				warn!("beam search stopped after {nodes_pushed} nodes without {} completions", self.top_k_pred);
				break;
			}
			let Some(entry) = frontier.pop() else {
				break;
			};

			let node = &arena[entry.node];
			if node.parent.is_some() && self.is_complete(node, seed.len()) {
				completed.push(entry.node);
				if completed.len() >= self.top_k_pred {
					break;
				}
				continue;
			}

			let Some(candidates) = scorer.top_candidates(&node.window, self.beam_width) else {
				continue;
			};
			expansions += 1;

			let children: Vec<BeamNode> = (0..self.beam_width)
				.map(|i| {
					let candidate = candidates
						.get(i)
						.cloned()
						.unwrap_or_else(|| Candidate::new(0.0, UNKNOWN_TOKEN));
					BeamNode {
						window: slide(&node.window, &candidate.token),
						log_prob: node.log_prob + candidate.probability.ln(),
						token: Some(candidate.token),
						parent: Some(entry.node),
						length: node.length + 1,
					}
				})
				.collect();

			for child in children {
				frontier.push(Frontier {
					score: child.log_prob,
					sequence: nodes_pushed,
					node: arena.len(),
				});
				arena.push(child);
				nodes_pushed += 1;
			}
		}

		let hypotheses = if completed.is_empty() {
			(0..self.top_k_pred)
				.map_while(|_| frontier.pop())
				.map(|entry| self.hypothesis(&arena, entry.node, seed, false))
				.collect()
		} else {
			// Stable sort: equal scores keep completion order
			completed.sort_by(|&a, &b| arena[b].log_prob.total_cmp(&arena[a].log_prob));
			completed
				.iter()
				.take(self.top_k_pred)
				.map(|&index| self.hypothesis(&arena, index, seed, true))
				.collect()
		};

		debug!(
			"beam search: {nodes_pushed} nodes, {expansions} expansions, {} completed",
			completed.len()
		);

		BeamOutcome {
			hypotheses,
			budget_exhausted,
			nodes_pushed,
			expansions,
		}
	}

	fn is_complete(&self, node: &BeamNode, seed_len: usize) -> bool {
		node.token.as_deref().is_some_and(is_terminator) || seed_len + node.length > self.max_len
	}

	/// Walks parent links back to the root and prefixes the seed.
	fn hypothesis(&self, arena: &[BeamNode], index: usize, seed: &[String], completed: bool) -> Hypothesis {
		let mut generated = Vec::new();
		let mut cursor = Some(index);
		while let Some(i) = cursor {
			if let Some(token) = &arena[i].token {
				generated.push(token.clone());
			}
			cursor = arena[i].parent;
		}
		generated.reverse();

		let tokens = seed
			.iter()
			.cloned()
			.chain(generated.into_iter().filter(|token| token != PAD_TOKEN))
			.collect();
		Hypothesis {
			tokens,
			log_prob: arena[index].log_prob,
			completed,
		}
	}
}

impl Decoder for BeamSearchDecoder {
	/// Falls back to the bare seed when the search found nothing.
	fn decode(&self, scorer: &dyn Scorer, seed: &[String]) -> Vec<TokenStream> {
		let hypotheses = self.search(scorer, seed).hypotheses;
		if hypotheses.is_empty() {
			return vec![seed.to_vec()];
		}
		hypotheses.into_iter().map(|hypothesis| hypothesis.tokens).collect()
	}
}
