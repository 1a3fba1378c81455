use std::sync::Arc;

use log::{debug, info};

use failure::{Error, Fail};

use stemscribe_core::config::Config as CoreConfig;

mod config;
use crate::config::Config as AppConfig;

mod pipeline;
use crate::pipeline::Pipeline;

mod server;
use crate::server::AppState;

mod tools;
use crate::tools::{DemucsSeparator, FfmpegMixer, TranskunTranscriber};

mod workers;

const STEMSCRIBE_CONFIG: &str = "STEMSCRIBE_CONFIG";
const DEFAULT_STEMSCRIBE_CONFIG: &str = "stemscribe.toml";

const STEMSCRIBE_LOG_CONFIG: &str = "STEMSCRIBE_LOG_CONFIG";
const DEFAULT_STEMSCRIBE_LOG_CONFIG: &str = "log4rs.yaml";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
  init_logging()?;

  let (core_config, app_config) = init_config()?;

  let pipeline = init_pipeline(&core_config, &app_config);

  let state = AppState::new(pipeline, app_config.http.static_dir.clone());
  let router = server::router(state, app_config.http.max_upload_bytes);

  server::serve(app_config.http.address().as_str(), router).await?;

  Ok(())
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(STEMSCRIBE_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_STEMSCRIBE_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    MainError::LoggingInit {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}

fn init_config() -> Result<(CoreConfig, AppConfig), Error> {
  let config_path =
    std::env::var(STEMSCRIBE_CONFIG).unwrap_or_else(|_| DEFAULT_STEMSCRIBE_CONFIG.to_string());

  info!("Loading configuration from {} ...", config_path);
  let core_config = CoreConfig::from_file(config_path.as_str())?;
  let app_config = AppConfig::from_file(config_path.as_str())?;
  debug!("{:#?}", core_config);
  debug!("{:#?}", app_config);

  Ok((core_config, app_config))
}

fn init_pipeline(core_config: &CoreConfig, app_config: &AppConfig) -> Pipeline {
  info!("Initialising the conversion pipeline ...");

  let storage = &core_config.storage;
  let layout = storage.layout();
  debug!("Stems are stored under {:?}", layout.root());

  Pipeline::new(
    layout,
    storage.upload_dir.clone(),
    core_config.midi.ticks_per_beat,
    Box::new(DemucsSeparator::new(&app_config.separation, storage)),
    Arc::new(TranskunTranscriber::new(&app_config.transcription)),
    app_config.transcription.workers,
    Box::new(FfmpegMixer::new(&app_config.mixer)),
  )
}
