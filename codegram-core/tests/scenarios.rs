use codegram_core::config::{DecodeConfig, DecodeMethod, Smoothing, TrainConfig};
use codegram_core::decoding::{BeamSearchDecoder, Decoder, GreedyDecoder, Scorer};
use codegram_core::model::{PredictionTable, train};
use codegram_core::{ModelError, TokenStream};

fn tokens(line: &str) -> TokenStream {
	line.split_whitespace().map(str::to_owned).collect()
}

fn small_table() -> PredictionTable {
	let corpus = vec![tokens("a b ;"), tokens("a b ;"), tokens("a c ;")];
	train(&corpus, &TrainConfig::new(3).unwrap()).unwrap()
}

#[test]
fn terminator_follows_a_b() {
	let table = small_table();
	let candidates = table.lookup("a b").unwrap();
	assert_eq!(candidates[0].token, ";");
	assert!((candidates[0].probability - 0.71875).abs() < 1e-12);
}

#[test]
fn line_start_prefers_the_frequent_token() {
	let table = small_table();
	let candidates = table.lookup("<pad> a").unwrap();
	assert_eq!(candidates.len(), 2);
	assert_eq!(candidates[0].token, "b");
	assert!((candidates[0].probability - 11.0 / 24.0).abs() < 1e-12);
	assert!((candidates[1].probability - 0.125).abs() < 1e-12);
}

#[test]
fn greedy_completes_the_statement() {
	let decoder = GreedyDecoder::new(3, 15).unwrap();
	assert_eq!(decoder.generate(&small_table(), &tokens("a")), tokens("a b ;"));
}

#[test]
fn beam_returns_one_completed_statement() {
	let decoder = BeamSearchDecoder::new(3, 15, 2, 1).unwrap();
	let outcome = decoder.search(&small_table(), &tokens("a"));

	assert_eq!(outcome.hypotheses.len(), 1);
	assert!(outcome.hypotheses[0].completed);
	assert_eq!(outcome.hypotheses[0].tokens.last().map(String::as_str), Some(";"));
}

#[test]
fn unseen_context_is_not_an_error() {
	let table = small_table();
	assert!(table.lookup("q r").is_none());
	assert!(table.top_candidates(&tokens("q r"), 3).is_none());

	let decoder = GreedyDecoder::new(3, 15).unwrap();
	assert_eq!(decoder.generate(&table, &tokens("q r")), tokens("q r"));
}

#[test]
fn misconfiguration_is_reported_before_decoding() {
	let config = DecodeConfig {
		method: DecodeMethod::Beam,
		beam_width: 1,
		top_k_pred: 3,
		..DecodeConfig::default()
	};
	assert!(matches!(config.build(), Err(ModelError::InvalidConfiguration { .. })));

	let train_config = TrainConfig {
		order: 2,
		..TrainConfig::default()
	};
	assert!(matches!(
		train(&[tokens("a b")], &train_config),
		Err(ModelError::InvalidConfiguration { .. })
	));
}

#[test]
fn built_decoders_share_one_table() {
	let table = small_table();
	for method in [DecodeMethod::Greedy, DecodeMethod::Beam] {
		let config = DecodeConfig {
			method,
			context_size: 3,
			beam_width: 2,
			..DecodeConfig::default()
		};
		let decoder: Box<dyn Decoder> = config.build().unwrap();
		assert_eq!(decoder.decode(&table, &tokens("a")), vec![tokens("a b ;")]);
	}
}

#[test]
fn maximum_likelihood_table_is_unsmoothed() {
	let config = TrainConfig::new(3).unwrap().without_smoothing();
	let corpus = vec![tokens("a b ;"), tokens("a b ;"), tokens("a c ;")];
	let table = train(&corpus, &config).unwrap();

	assert_eq!(table.smoothing(), Smoothing::MaximumLikelihood);
	let candidates = table.lookup("<pad> a").unwrap();
	assert!((candidates[0].probability - 2.0 / 3.0).abs() < 1e-12);
	assert!((candidates[1].probability - 1.0 / 3.0).abs() < 1e-12);
}
