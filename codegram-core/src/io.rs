use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::TokenStream;

/// Extension of serialized prediction tables.
pub const MODEL_EXTENSION: &str = "bin";

/// Reads a corpus file as one token stream per line.
///
/// - Tokens are whitespace-separated (the file is already lexed)
/// - Blank lines are skipped
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<Vec<TokenStream>> {
	let reader = BufReader::new(File::open(filename)?);
	let mut corpus = Vec::new();
	for line in reader.lines() {
		let stream = tokenize_line(&line?);
		if !stream.is_empty() {
			corpus.push(stream);
		}
	}
	Ok(corpus)
}

/// Splits an already-lexed line into tokens.
pub fn tokenize_line(line: &str) -> TokenStream {
	line.split_whitespace().map(str::to_owned).collect()
}

/// Builds the cache path of a table trained from `corpus_path`.
///
/// Example:
/// `data/java.txt`, order 4, tag `"kn"` → `data/java.4gram-kn.bin`
pub fn cache_path<P: AsRef<Path>>(corpus_path: P, order: usize, tag: &str) -> io::Result<PathBuf> {
	let corpus_path = corpus_path.as_ref();

	let parent = corpus_path.parent().unwrap_or_else(|| Path::new("."));
	let stem = corpus_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Corpus path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(stem);
	output.set_extension(format!("{order}gram-{tag}.{MODEL_EXTENSION}"));
	Ok(output)
}

/// Returns the model name of a path: its file name up to the first dot.
///
/// Examples:
/// - `"./data/java.4gram-kn.bin"` → `"java"`
/// - `"java.bin"` → `"java"`
pub fn model_name<P: AsRef<Path>>(path: P) -> io::Result<String> {
	let name = path
		.as_ref()
		.file_name()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?
		.to_string_lossy();

	Ok(name.split('.').next().unwrap_or_default().to_owned())
}

/// Lists the serialized models of a directory, sorted by file name.
///
/// Returns file names only (no paths).
pub fn list_models<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}
