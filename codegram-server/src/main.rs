use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, put, web};
use env_logger::Env;
use log::{info, warn};
use serde::Deserialize;

use codegram_core::config::{DecodeConfig, DecodeMethod};
use codegram_core::decoding::{Decoder, Scorer};
use codegram_core::io::{MODEL_EXTENSION, list_models, tokenize_line};
use codegram_core::model::PredictionTable;
use codegram_core::{PAD_TOKEN, TokenStream};

const DATA_DIR: &str = "./data";

/// Query parameters of the `/v1/predict` endpoint
#[derive(Deserialize)]
struct PredictParams {
	context: String,
	top_k: Option<usize>,
}

/// Query parameters of the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	seed: Option<String>, // -> random or custom:<tokens>
	method: Option<String>,
	context_size: Option<usize>,
	max_len: Option<usize>,
	beam_width: Option<usize>,
	top_k_pred: Option<usize>,
}

#[derive(Deserialize)]
struct ModelQuery {
	name: Option<String>,
}

/// The table currently served and the name it was loaded under.
struct LoadedModel {
	name: String,
	table: Arc<PredictionTable>,
}

/// State shared by every worker.
///
/// Requests clone the `Arc` and release the lock before decoding, so a
/// model swap never waits for running generations.
struct SharedData {
	data_dir: PathBuf,
	loaded: RwLock<Option<LoadedModel>>,
}

impl SharedData {
	fn table(&self) -> Result<Arc<PredictionTable>, HttpResponse> {
		let loaded = self
			.loaded
			.read()
			.map_err(|_| HttpResponse::InternalServerError().body("Model lock failed"))?;
		match loaded.as_ref() {
			Some(model) => Ok(Arc::clone(&model.table)),
			None => Err(HttpResponse::Conflict().body("No model loaded")),
		}
	}
}

impl GenerateParams {
	/// Resolves the seed tokens.
	fn seed(&self, table: &PredictionTable) -> Result<TokenStream, String> {
		match &self.seed {
			None => random_seed(table),
			Some(s) if s.eq_ignore_ascii_case("random") => random_seed(table),
			Some(s) if s.to_lowercase().starts_with("custom:") => {
				let value = tokenize_line(&s["custom:".len()..]);
				if value.is_empty() {
					Err("Custom seed cannot be empty".into())
				} else {
					Ok(value)
				}
			}
			Some(_) => Err("Seed must be 'random' or start with 'custom:'".into()),
		}
	}

	/// Decode configuration: the table order unless overridden.
	fn decode_config(&self, table: &PredictionTable) -> Result<DecodeConfig, String> {
		let defaults = DecodeConfig::default();
		let method = match &self.method {
			Some(m) => m.parse::<DecodeMethod>().map_err(|e| e.to_string())?,
			None => defaults.method,
		};
		Ok(DecodeConfig {
			method,
			context_size: self.context_size.unwrap_or(table.order()),
			max_len: self.max_len.unwrap_or(defaults.max_len),
			beam_width: self.beam_width.unwrap_or(defaults.beam_width),
			top_k_pred: self.top_k_pred.unwrap_or(defaults.top_k_pred),
			..defaults
		})
	}

	/// Builds the requested decoder, refusing windows narrower than the
	/// table order.
	fn decoder(&self, table: &PredictionTable) -> Result<Box<dyn Decoder>, String> {
		self.decode_config(table)?.build_for(table).map_err(|e| e.to_string())
	}
}

fn random_seed(table: &PredictionTable) -> Result<TokenStream, String> {
	let context = table
		.random_context(&mut rand::rng())
		.ok_or_else(|| "The loaded model is empty".to_owned())?;
	Ok(context
		.split(' ')
		.filter(|token| *token != PAD_TOKEN)
		.map(str::to_owned)
		.collect())
}

/// HTTP GET endpoint `/v1/predict`
///
/// Ranked candidates following a space-separated context.
#[get("/v1/predict")]
async fn get_predict(data: web::Data<SharedData>, query: web::Query<PredictParams>) -> impl Responder {
	let table = match data.table() {
		Ok(t) => t,
		Err(response) => return response,
	};

	let window = tokenize_line(&query.context);
	match table.top_candidates(&window, query.top_k.unwrap_or(5)) {
		Some(candidates) => HttpResponse::Ok().json(candidates),
		None => HttpResponse::NotFound().body(format!("Unknown context '{}'", window.join(" "))),
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Completes a seed with the loaded table. Returns the decoded sequences,
/// best first.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<SharedData>, query: web::Query<GenerateParams>) -> impl Responder {
	let table = match data.table() {
		Ok(t) => t,
		Err(response) => return response,
	};

	let seed = match query.seed(&table) {
		Ok(s) => s,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};
	let decoder = match query.decoder(&table) {
		Ok(d) => d,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};

	let sequences: Vec<String> = decoder
		.decode(table.as_ref(), &seed)
		.iter()
		.map(|sequence| sequence.join(" "))
		.collect();
	HttpResponse::Ok().json(sequences)
}

#[get("/v1/models")]
async fn get_models(data: web::Data<SharedData>) -> impl Responder {
	match list_models(&data.data_dir) {
		Ok(names) => HttpResponse::Ok().json(names),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

#[get("/v1/loaded_model")]
async fn get_loaded_model(data: web::Data<SharedData>) -> impl Responder {
	let loaded = match data.loaded.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match loaded.as_ref() {
		Some(model) => HttpResponse::Ok().body(model.name.clone()),
		None => HttpResponse::Conflict().body("No model loaded"),
	}
}

#[put("/v1/load_model")]
async fn put_model(data: web::Data<SharedData>, query: web::Query<ModelQuery>) -> impl Responder {
	let name = match &query.name {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};
	if name.contains(['/', '\\']) || name.starts_with('.') {
		return HttpResponse::BadRequest().body("Invalid model name");
	}

	let model_path = data.data_dir.join(format!("{name}.{MODEL_EXTENSION}"));
	let table = match PredictionTable::load(&model_path) {
		Ok(t) => t,
		Err(e) => {
			warn!("failed to load {}: {e}", model_path.display());
			return HttpResponse::InternalServerError().body(format!("Failed to load model: {e}"));
		}
	};

	let mut loaded = match data.loaded.write() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	info!("serving {name}: order {}, {} contexts", table.order(), table.len());
	*loaded = Some(LoadedModel {
		name: name.to_owned(),
		table: Arc::new(table),
	});

	HttpResponse::Ok().body("Model loaded successfully")
}

/// Main entry point for the server.
///
/// Starts with no model loaded; clients pick one with `PUT /v1/load_model`.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Models are read from `./data/<name>.bin`.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

	let shared_data = web::Data::new(SharedData {
		data_dir: PathBuf::from(DATA_DIR),
		loaded: RwLock::new(None),
	});

	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_data.clone())
			.service(get_predict)
			.service(get_generated)
			.service(get_models)
			.service(get_loaded_model)
			.service(put_model)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}
