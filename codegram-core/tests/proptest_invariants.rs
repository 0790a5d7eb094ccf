//! Property-based invariant tests for training and decoding.
//!
//! 1. Every stored probability is finite and non-negative
//! 2. Candidate lists are ranked best first
//! 3. Counting does not depend on corpus order or sharding
//! 4. Greedy decoding is deterministic and bounded
//! 5. Beam search respects its budget and result count
//! 6. Without discount, Kneser-Ney ranks like maximum likelihood

use std::cmp::Ordering;

use codegram_core::config::TrainConfig;
use codegram_core::decoding::{BeamSearchDecoder, GreedyDecoder};
use codegram_core::model::{ContextCountIndex, train};
use codegram_core::{PAD_TOKEN, TokenStream, is_terminator};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

const ALPHABET: [&str; 7] = ["int", "x", "=", "1", ";", "{", "}"];

fn stream_strategy() -> impl Strategy<Value = TokenStream> {
	prop::collection::vec(prop::sample::select(ALPHABET.to_vec()), 0..10)
		.prop_map(|tokens| tokens.into_iter().map(str::to_owned).collect())
}

fn corpus_strategy() -> impl Strategy<Value = Vec<TokenStream>> {
	prop::collection::vec(stream_strategy(), 0..25)
}

// ═══════════════════════════════════════════════════════════════════════
// 1-2. Table contents
// ═══════════════════════════════════════════════════════════════════════

proptest! {
	#[test]
	fn probabilities_are_finite_and_ranked(corpus in corpus_strategy(), order in 3usize..6) {
		let table = train(&corpus, &TrainConfig::new(order).unwrap()).unwrap();
		for (_, candidates) in table.iter() {
			prop_assert!(!candidates.is_empty());
			for candidate in candidates {
				prop_assert!(candidate.probability.is_finite());
				prop_assert!(candidate.probability >= 0.0);
			}
			for pair in candidates.windows(2) {
				prop_assert_ne!(pair[0].rank(&pair[1]), Ordering::Greater);
			}
		}
	}

	#[test]
	fn tables_are_rebuilt_identically(corpus in corpus_strategy()) {
		let config = TrainConfig::new(4).unwrap();
		prop_assert_eq!(train(&corpus, &config).unwrap(), train(&corpus, &config).unwrap());
	}
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Counting
// ═══════════════════════════════════════════════════════════════════════

proptest! {
	#[test]
	fn counting_ignores_stream_order(corpus in corpus_strategy()) {
		let mut reversed = corpus.clone();
		reversed.reverse();
		prop_assert_eq!(
			ContextCountIndex::from_corpus(&corpus, 4).unwrap(),
			ContextCountIndex::from_corpus(&reversed, 4).unwrap()
		);
	}

	#[test]
	fn counting_ignores_sharding(corpus in corpus_strategy(), shards in 1usize..9) {
		prop_assert_eq!(
			ContextCountIndex::from_corpus_sharded(&corpus, 4, shards).unwrap(),
			ContextCountIndex::from_corpus(&corpus, 4).unwrap()
		);
	}
}

// ═══════════════════════════════════════════════════════════════════════
// 4-5. Decoding
// ═══════════════════════════════════════════════════════════════════════

proptest! {
	#[test]
	fn greedy_is_deterministic_and_bounded(
		corpus in corpus_strategy(),
		seed in stream_strategy(),
		max_len in 1usize..20,
	) {
		let table = train(&corpus, &TrainConfig::new(3).unwrap()).unwrap();
		let decoder = GreedyDecoder::new(3, max_len).unwrap();

		let output = decoder.generate(&table, &seed);
		prop_assert_eq!(&output, &decoder.generate(&table, &seed));
		prop_assert!(output.starts_with(&seed));
		prop_assert!(output.len() <= seed.len().max(max_len) + 1);

		// Generated tokens never include a terminator before the last one
		let generated = &output[seed.len()..];
		if let Some((_, body)) = generated.split_last() {
			prop_assert!(body.iter().all(|token| !is_terminator(token)));
		}
	}

	#[test]
	fn beam_respects_budget_and_result_count(
		corpus in corpus_strategy(),
		seed in stream_strategy(),
		beam_width in 2usize..5,
		top_k_pred in 1usize..4,
		max_nodes in 1usize..200,
	) {
		let table = train(&corpus, &TrainConfig::new(3).unwrap()).unwrap();
		let decoder = BeamSearchDecoder::new(3, 12, beam_width, top_k_pred)
			.unwrap()
			.with_max_nodes(max_nodes)
			.unwrap();

		let outcome = decoder.search(&table, &seed);
		prop_assert!(outcome.nodes_pushed <= max_nodes + beam_width);
		prop_assert!(outcome.nodes_pushed <= 1 + beam_width * outcome.expansions);
		prop_assert!(outcome.hypotheses.len() <= top_k_pred);
		for hypothesis in &outcome.hypotheses {
			prop_assert!(hypothesis.tokens.starts_with(&seed));
			prop_assert!(hypothesis.tokens[seed.len()..].iter().all(|token| token != PAD_TOKEN));
		}
		for pair in outcome.hypotheses.windows(2) {
			prop_assert!(pair[0].log_prob >= pair[1].log_prob);
		}
	}
}

// ═══════════════════════════════════════════════════════════════════════
// 6. Estimators
// ═══════════════════════════════════════════════════════════════════════

proptest! {
	#[test]
	fn undiscounted_kneser_ney_ranks_like_mle(corpus in corpus_strategy()) {
		let mut kn_config = TrainConfig::new(3).unwrap();
		kn_config.set_discount(0.0).unwrap();
		let kn = train(&corpus, &kn_config).unwrap();
		let mle = train(&corpus, &TrainConfig::new(3).unwrap().without_smoothing()).unwrap();

		prop_assert_eq!(kn.len(), mle.len());
		for (context, candidates) in mle.iter() {
			let smoothed = kn.lookup(context).unwrap();
			prop_assert_eq!(&smoothed[0].token, &candidates[0].token);
		}
	}
}
