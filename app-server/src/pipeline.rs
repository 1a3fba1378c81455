use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use failure::Fail;
use log::{debug, info, warn};
use serde_derive::Serialize;

use stemscribe_core::instrument::Instrument;
use stemscribe_core::layout::{LayoutError, StemLayout};
use stemscribe_core::midi::{NoteFile, NoteFileError, TimedEvent};
use stemscribe_core::notes::{extract_notes, MergeError, NoteRecord, TrackMerger};

use crate::tools::{Mixer, Separator, ToolError, Transcriber};
use crate::workers::{TranscriptionJob, TranscriptionWorkers, WorkersError};

#[derive(Debug, Fail)]
pub enum PipelineError {
  #[fail(display = "No instruments selected")]
  NothingSelected,

  #[fail(display = "{}", cause)]
  InvalidPath { cause: LayoutError },

  #[fail(display = "File not found: {}", path)]
  NotFound { path: String },

  #[fail(display = "Stem for {} not found", label)]
  MissingSource { label: String },

  #[fail(display = "Failed to store the upload {}: {}", path, cause)]
  Upload { path: String, cause: String },

  #[fail(display = "Conversion process failed: {}", cause)]
  Separation { cause: ToolError },

  #[fail(display = "Error loading {} notes: {}", label, cause)]
  Notes { label: String, cause: NoteFileError },

  #[fail(display = "Failed to mix the stems: {}", cause)]
  Mix { cause: ToolError },

  #[fail(display = "{}", cause)]
  Workers { cause: WorkersError },
}

impl PipelineError {
  /// Output captured from the external tool behind this error, if any.
  pub fn details(&self) -> Option<&str> {
    match self {
      PipelineError::Separation { cause } | PipelineError::Mix { cause } => cause.details(),
      _ => None,
    }
  }
}

impl From<MergeError> for PipelineError {
  fn from(err: MergeError) -> Self {
    match err {
      MergeError::MissingSource { label } => PipelineError::MissingSource { label },
    }
  }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Public paths of an instrument's stem files; empty when the file is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentFiles {
  pub audio_path: String,
  pub note_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
  pub stem_output_id: String,
  pub instrument_files: BTreeMap<String, InstrumentFiles>,
  pub visualization_data: BTreeMap<String, Vec<NoteRecord>>,
  /// Resolution the visualized notes are measured in, per instrument.
  pub ticks_per_beat: BTreeMap<String, Option<u16>>,
}

pub struct Pipeline {
  layout: StemLayout,
  upload_dir: PathBuf,
  ticks_per_beat: u16,
  separator: Box<dyn Separator>,
  workers: TranscriptionWorkers,
  mixer: Box<dyn Mixer>,
}

impl Pipeline {
  pub fn new(
    layout: StemLayout,
    upload_dir: PathBuf,
    ticks_per_beat: u16,
    separator: Box<dyn Separator>,
    transcriber: Arc<dyn Transcriber>,
    num_workers: usize,
    mixer: Box<dyn Mixer>,
  ) -> Pipeline {
    Pipeline {
      layout,
      upload_dir,
      ticks_per_beat,
      separator,
      workers: TranscriptionWorkers::new(transcriber, num_workers),
      mixer,
    }
  }

  pub fn layout(&self) -> &StemLayout {
    &self.layout
  }

  /// Stores an upload, splits it into stems, transcribes the pitched ones
  /// and reports what is available for each instrument.
  pub fn convert(&self, file_name: &str, data: &[u8]) -> PipelineResult<ConversionReport> {
    let upload_name =
      StemLayout::upload_name(file_name).map_err(|cause| PipelineError::InvalidPath { cause })?;
    let output_id =
      StemLayout::output_id(file_name).map_err(|cause| PipelineError::InvalidPath { cause })?;

    let upload_path = self.store_upload(&upload_name, data)?;

    self
      .separator
      .separate(&upload_path)
      .map_err(|cause| PipelineError::Separation { cause })?;

    let jobs = self.transcription_jobs(&output_id);
    let outcomes = self
      .workers
      .run(jobs)
      .map_err(|cause| PipelineError::Workers { cause })?;

    for outcome in outcomes.iter().filter(|outcome| outcome.result.is_ok()) {
      self.relabel(outcome.job.instrument, &outcome.job.notes);
    }

    Ok(self.report(&output_id))
  }

  /// Merges the note files of the given instruments into one multi-track file.
  pub fn combine_notes<L>(&self, output_id: &str, labels: &[L]) -> PipelineResult<Vec<u8>>
  where
    L: AsRef<str>,
  {
    if labels.is_empty() {
      return Err(PipelineError::NothingSelected);
    }

    let mut files: Vec<(String, NoteFile)> = Vec::with_capacity(labels.len());
    for label in labels.iter().map(AsRef::as_ref) {
      let path = self.source_path(output_id, label, self.layout.note_file_name(label))?;
      debug!("Looking for note file {:?}", path);
      let file = NoteFile::open(&path).map_err(|cause| PipelineError::Notes {
        label: label.to_string(),
        cause,
      })?;
      files.push((label.to_string(), file));
    }

    let mut streams: Vec<(String, Vec<TimedEvent>)> = Vec::with_capacity(files.len());
    for (label, file) in files.iter() {
      let events = file.events().map_err(|cause| PipelineError::Notes {
        label: label.clone(),
        cause,
      })?;
      streams.push((label.clone(), events));
    }

    let merger = TrackMerger::new(self.ticks_per_beat);
    let combined = merger.merge_from(labels, |label| {
      streams
        .iter()
        .find(|(source, _)| source == label)
        .map(|(_, events)| events.clone())
    })?;

    combined.write().map_err(|cause| PipelineError::Notes {
      label: "combined".to_string(),
      cause,
    })
  }

  /// Overlays the audio stems of the given instruments.
  pub fn combine_audio<L>(&self, output_id: &str, labels: &[L]) -> PipelineResult<Vec<u8>>
  where
    L: AsRef<str>,
  {
    if labels.is_empty() {
      return Err(PipelineError::NothingSelected);
    }

    let mut inputs = Vec::with_capacity(labels.len());
    for label in labels.iter().map(AsRef::as_ref) {
      let path = self.source_path(output_id, label, self.layout.audio_file_name(label))?;
      debug!("Looking for audio file {:?}", path);
      inputs.push(path);
    }

    self
      .mixer
      .mix(&inputs)
      .map_err(|cause| PipelineError::Mix { cause })
  }

  /// Resolves a client requested path to an existing file under the stem root.
  pub fn resolve_download(&self, relative: &str) -> PipelineResult<PathBuf> {
    let path = self
      .layout
      .resolve(relative)
      .map_err(|cause| PipelineError::InvalidPath { cause })?;
    info!("Received download request for {} -> {:?}", relative, path);

    if path.is_file() {
      Ok(path)
    } else {
      Err(PipelineError::NotFound {
        path: relative.to_string(),
      })
    }
  }

  fn store_upload(&self, upload_name: &str, data: &[u8]) -> PipelineResult<PathBuf> {
    let path = self.upload_dir.join(upload_name);
    info!("Storing upload {:?} ({} bytes) ...", path, data.len());
    fs::create_dir_all(&self.upload_dir)
      .and_then(|()| fs::write(&path, data))
      .map_err(|err| PipelineError::Upload {
        path: path.display().to_string(),
        cause: err.to_string(),
      })?;
    Ok(path)
  }

  fn transcription_jobs(&self, output_id: &str) -> Vec<TranscriptionJob> {
    let stems = match self.layout.stems(output_id) {
      Ok(stems) => stems,
      Err(err) => {
        warn!("{}", err);
        return Vec::new();
      }
    };

    stems
      .into_iter()
      .filter_map(|audio| {
        let file_name = audio.file_name()?.to_string_lossy().into_owned();
        match Instrument::match_stem(&file_name) {
          Some(instrument) => {
            let notes = audio.with_extension(self.layout.note_extension());
            discard_stale_notes(&notes);
            Some(TranscriptionJob {
              instrument,
              audio,
              notes,
            })
          }
          None => {
            info!("Skipping {} (no matching instrument)", file_name);
            None
          }
        }
      })
      .collect()
  }

  fn relabel(&self, instrument: Instrument, notes: &Path) {
    let result = NoteFile::open(notes)
      .and_then(|file| file.relabel_program(instrument.program()))
      .and_then(|(bytes, count)| {
        fs::write(notes, bytes)
          .map(|()| count)
          .map_err(|err| NoteFileError::Write {
            cause: err.to_string(),
          })
      });

    match result {
      Ok(count) => info!(
        "Instrument changed to {} for {:?} ({} program changes)",
        instrument, notes, count
      ),
      Err(err) => warn!("Failed to relabel {:?}: {}", notes, err),
    }
  }

  fn report(&self, output_id: &str) -> ConversionReport {
    let mut instrument_files = BTreeMap::new();
    let mut visualization_data = BTreeMap::new();
    let mut ticks_per_beat = BTreeMap::new();

    for instrument in Instrument::ALL.iter() {
      let label = instrument.label();
      let audio_path = self.layout.audio_path(output_id, label);
      let note_path = self.layout.note_path(output_id, label);

      let files = InstrumentFiles {
        audio_path: self.public_path_if_exists(output_id, &audio_path),
        note_path: self.public_path_if_exists(output_id, &note_path),
      };

      let (notes, resolution) = if note_path.is_file() {
        self.visualize(label, &note_path)
      } else {
        (Vec::new(), None)
      };

      instrument_files.insert(label.to_string(), files);
      visualization_data.insert(label.to_string(), notes);
      ticks_per_beat.insert(label.to_string(), resolution);
    }

    ConversionReport {
      stem_output_id: output_id.to_string(),
      instrument_files,
      visualization_data,
      ticks_per_beat,
    }
  }

  fn visualize(&self, label: &str, note_path: &Path) -> (Vec<NoteRecord>, Option<u16>) {
    let result = NoteFile::open(note_path).and_then(|file| {
      let resolution = file.ticks_per_beat()?;
      let notes = extract_notes(file.events()?.iter());
      Ok((notes, resolution))
    });

    match result {
      Ok((notes, resolution)) => {
        info!(
          "Extracted {} notes for {} ({:?} ticks per beat)",
          notes.len(),
          label,
          resolution
        );
        (notes, resolution)
      }
      Err(err) => {
        warn!("Failed to extract notes from {:?}: {}", note_path, err);
        (Vec::new(), None)
      }
    }
  }

  fn public_path_if_exists(&self, output_id: &str, path: &Path) -> String {
    match path.file_name() {
      Some(file_name) if path.is_file() => self
        .layout
        .public_path(output_id, &file_name.to_string_lossy()),
      _ => String::new(),
    }
  }

  fn source_path(&self, output_id: &str, label: &str, file_name: String) -> PipelineResult<PathBuf> {
    let relative = self.layout.public_path(output_id, &file_name);
    let path = self
      .layout
      .resolve(&relative)
      .map_err(|cause| PipelineError::InvalidPath { cause })?;

    if path.is_file() {
      Ok(path)
    } else {
      warn!("{} file for {} not found: {:?}", file_name, label, path);
      Err(PipelineError::MissingSource {
        label: label.to_string(),
      })
    }
  }
}

fn discard_stale_notes(notes: &Path) {
  match fs::remove_file(notes) {
    Ok(()) => debug!("Removed note file {:?} from a previous conversion", notes),
    Err(ref err) if err.kind() == io::ErrorKind::NotFound => {}
    Err(err) => warn!("Failed to remove old note file {:?}: {}", notes, err),
  }
}
