use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use codegram_core::config::{DecodeConfig, DecodeMethod, TrainConfig};
use codegram_core::decoding::{Scorer, generate_templates};
use codegram_core::io::{cache_path, read_corpus, tokenize_line};
use codegram_core::model::{PredictionTable, load_or_train, train, train_with_vocabulary};
use codegram_core::vocab::Vocabulary;
use codegram_core::{PAD_TOKEN, TokenStream};
use env_logger::Env;
use log::info;
use serde_json::json;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "N-gram code completion toolkit", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv)
	#[arg(short = 'v', long, global = true, action = ArgAction::Count)]
	verbose: u8,

	/// Decrease verbosity (-q, -qq)
	#[arg(short = 'q', long, global = true, action = ArgAction::Count)]
	quiet: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Train a prediction table from a tokenized corpus
	Train(TrainArgs),
	/// Print the ranked candidates following a context
	Predict(PredictArgs),
	/// Complete a seed into full statements
	Generate(GenerateArgs),
	/// Decode the prefix of every held-out line
	Templates(TemplatesArgs),
	/// Build a vocabulary from a corpus
	Vocab(VocabArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
	/// Corpus file, one whitespace-tokenized line per stream
	corpus: PathBuf,

	/// Highest n-gram order
	#[arg(short = 'n', long, default_value_t = 5)]
	order: usize,

	/// Kneser-Ney discount in [0, 1)
	#[arg(long, value_name = "D")]
	discount: Option<f64>,

	/// Disable smoothing (maximum likelihood)
	#[arg(long, conflicts_with = "discount")]
	mle: bool,

	/// Do not pad streams with <pad> tokens
	#[arg(long)]
	no_padding: bool,

	/// Parallel counting shards (0 = from CPU count)
	#[arg(long, default_value_t = 0)]
	shards: usize,

	/// Vocabulary JSON; other tokens become <idf>
	#[arg(long, value_name = "PATH")]
	vocab: Option<PathBuf>,

	/// Output table (defaults to the cache next to the corpus)
	#[arg(short, long, value_name = "PATH")]
	output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
	/// Trained table (.bin)
	#[arg(short, long, value_name = "PATH")]
	model: PathBuf,

	/// Context tokens, separated by spaces
	context: String,

	/// Number of candidates to print
	#[arg(short = 'k', long, default_value_t = 5)]
	top_k: usize,
}

#[derive(Args, Debug)]
struct DecodeArgs {
	/// JSON decode configuration; flags override its fields
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// greedy or beam
	#[arg(long)]
	method: Option<DecodeMethod>,

	/// Window size counted as an n-gram order (defaults to the table order)
	#[arg(long)]
	context_size: Option<usize>,

	/// Maximum output length, seed included
	#[arg(long)]
	max_len: Option<usize>,

	/// Candidates expanded per beam node
	#[arg(long)]
	beam_width: Option<usize>,

	/// Sequences returned by beam search
	#[arg(long)]
	top_k_pred: Option<usize>,

	/// Beam search node budget
	#[arg(long)]
	max_nodes: Option<usize>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// Trained table (.bin)
	#[arg(short, long, value_name = "PATH")]
	model: PathBuf,

	/// Seed tokens (a random context from the table when omitted)
	#[arg(short, long)]
	seed: Option<String>,

	#[command(flatten)]
	decode: DecodeArgs,
}

#[derive(Args, Debug)]
struct TemplatesArgs {
	/// Trained table (.bin)
	#[arg(short, long, value_name = "PATH")]
	model: PathBuf,

	/// Held-out corpus file
	input: PathBuf,

	/// Leading tokens of each line used as seed
	#[arg(long, default_value_t = 3)]
	seed_len: usize,

	/// JSON lines output (stdout when omitted)
	#[arg(short, long, value_name = "PATH")]
	output: Option<PathBuf>,

	#[command(flatten)]
	decode: DecodeArgs,
}

#[derive(Args, Debug)]
struct VocabArgs {
	/// Corpus file
	corpus: PathBuf,

	/// Number of tokens kept, reserved ones excluded
	#[arg(long, default_value_t = 10_000)]
	size: usize,

	/// Output JSON path
	#[arg(short, long, value_name = "PATH", default_value = "vocab.json")]
	output: PathBuf,
}

fn main() -> CliResult<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Commands::Train(args) => run_train(args),
		Commands::Predict(args) => run_predict(args),
		Commands::Generate(args) => run_generate(args),
		Commands::Templates(args) => run_templates(args),
		Commands::Vocab(args) => run_vocab(args),
	}
}

fn init_logging(verbose: u8, quiet: u8) {
	use log::LevelFilter;

	let level = match (quiet, verbose) {
		(1, _) => LevelFilter::Warn,
		(q, _) if q > 1 => LevelFilter::Error,
		(_, 0) => LevelFilter::Info,
		(_, 1) => LevelFilter::Debug,
		_ => LevelFilter::Trace,
	};

	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	builder.format_timestamp_millis();
	builder.filter_level(level);
	let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> CliResult<()> {
	let mut config = TrainConfig {
		order: args.order,
		pad_streams: !args.no_padding,
		shards: args.shards,
		..TrainConfig::default()
	};
	if args.mle {
		config = config.without_smoothing();
	}
	if let Some(discount) = args.discount {
		config.set_discount(discount)?;
	}
	config.validate()?;

	// Plain runs go through the corpus cache
	if args.vocab.is_none() && args.output.is_none() {
		let table = load_or_train(&args.corpus, &config)?;
		info!("{} contexts ready", table.len());
		return Ok(());
	}

	let corpus = read_corpus(&args.corpus)?;
	let table = match &args.vocab {
		Some(path) => train_with_vocabulary(&corpus, &Vocabulary::load(path)?, &config)?,
		None => train(&corpus, &config)?,
	};
	let output = match args.output {
		Some(path) => path,
		None => cache_path(&args.corpus, config.order, config.smoothing.tag())?,
	};
	table.save(&output)?;
	info!("{} contexts written to {}", table.len(), output.display());
	Ok(())
}

fn run_predict(args: PredictArgs) -> CliResult<()> {
	let table = PredictionTable::load(&args.model)?;
	let window = tokenize_line(&args.context);

	match table.top_candidates(&window, args.top_k) {
		Some(candidates) => println!("{}", serde_json::to_string_pretty(&candidates)?),
		None => println!("{}", json!({ "context": window.join(" "), "candidates": [] })),
	}
	Ok(())
}

fn run_generate(args: GenerateArgs) -> CliResult<()> {
	let table = PredictionTable::load(&args.model)?;
	let config = decode_config(&args.decode, &table)?;
	let decoder = config.build_for(&table)?;

	let seed: TokenStream = match &args.seed {
		Some(seed) => tokenize_line(seed),
		None => random_seed(&table).ok_or("the table is empty")?,
	};
	info!("decoding from seed '{}' with {:?}", seed.join(" "), config.method);

	for sequence in decoder.decode(&table, &seed) {
		println!("{}", json!({ "seed": seed.join(" "), "sequence": sequence.join(" ") }));
	}
	Ok(())
}

fn run_templates(args: TemplatesArgs) -> CliResult<()> {
	let table = PredictionTable::load(&args.model)?;
	let decoder = decode_config(&args.decode, &table)?.build_for(&table)?;
	let streams = read_corpus(&args.input)?;

	let templates = generate_templates(&table, decoder.as_ref(), &streams, args.seed_len);
	let exact = templates.iter().filter(|t| t.is_exact()).count();

	let mut writer: Box<dyn Write> = match &args.output {
		Some(path) => Box::new(BufWriter::new(File::create(path)?)),
		None => Box::new(BufWriter::new(io::stdout().lock())),
	};
	for template in &templates {
		serde_json::to_writer(&mut writer, template)?;
		writeln!(writer)?;
	}
	writer.flush()?;

	info!("{exact} of {} lines reproduced exactly", templates.len());
	Ok(())
}

fn run_vocab(args: VocabArgs) -> CliResult<()> {
	let corpus = read_corpus(&args.corpus)?;
	let vocabulary = Vocabulary::build(&corpus, args.size);
	vocabulary.save(&args.output)?;
	info!("{} tokens written to {}", vocabulary.len(), args.output.display());
	Ok(())
}

/// Merges the JSON configuration, the flags and the table order.
fn decode_config(args: &DecodeArgs, table: &PredictionTable) -> CliResult<DecodeConfig> {
	let mut config = match &args.config {
		Some(path) => load_decode_config(path)?,
		None => DecodeConfig {
			context_size: table.order(),
			..DecodeConfig::default()
		},
	};

	if let Some(method) = args.method {
		config.method = method;
	}
	if let Some(context_size) = args.context_size {
		config.context_size = context_size;
	}
	if let Some(max_len) = args.max_len {
		config.max_len = max_len;
	}
	if let Some(beam_width) = args.beam_width {
		config.beam_width = beam_width;
	}
	if let Some(top_k_pred) = args.top_k_pred {
		config.top_k_pred = top_k_pred;
	}
	if let Some(max_nodes) = args.max_nodes {
		config.max_nodes = max_nodes;
	}
	Ok(config)
}

fn load_decode_config(path: &Path) -> CliResult<DecodeConfig> {
	let config = DecodeConfig::from_file(path)?;
	info!("decode configuration read from {}", path.display());
	Ok(config)
}

/// A random context of the table, without its padding.
fn random_seed(table: &PredictionTable) -> Option<TokenStream> {
	let context = table.random_context(&mut rand::rng())?;
	Some(
		context
			.split(' ')
			.filter(|token| *token != PAD_TOKEN)
			.map(str::to_owned)
			.collect(),
	)
}
