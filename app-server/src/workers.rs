use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use failure::Fail;
use log::{debug, info, warn};

use stemscribe_core::instrument::Instrument;

use crate::tools::{ToolResult, Transcriber};

#[derive(Debug, Fail)]
pub enum WorkersError {
  #[fail(display = "Failed to create the transcription workers: {}", cause)]
  Start { cause: String },

  #[fail(display = "Transcription worker {} stopped unexpectedly", name)]
  Stop { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
  pub instrument: Instrument,
  pub audio: PathBuf,
  pub notes: PathBuf,
}

pub struct TranscriptionOutcome {
  pub job: TranscriptionJob,
  pub result: ToolResult<()>,
}

struct Indexed<T> {
  index: usize,
  item: T,
}

/// Transcribes stems on a fixed set of threads.
///
/// Every job reports its own result, so a failing stem doesn't stop the others.
pub struct TranscriptionWorkers {
  transcriber: Arc<dyn Transcriber>,
  num_threads: usize,
}

impl TranscriptionWorkers {
  pub fn new(transcriber: Arc<dyn Transcriber>, num_threads: usize) -> TranscriptionWorkers {
    TranscriptionWorkers {
      transcriber,
      num_threads: num_threads.max(1),
    }
  }

  /// Runs all the jobs and returns their outcomes in job order.
  pub fn run(
    &self,
    jobs: Vec<TranscriptionJob>,
  ) -> Result<Vec<TranscriptionOutcome>, WorkersError> {
    if jobs.is_empty() {
      return Ok(Vec::new());
    }

    let num_jobs = jobs.len();
    let num_threads = self.num_threads.min(num_jobs);
    info!(
      "Starting {} transcription workers for {} stems ...",
      num_threads, num_jobs
    );

    let (job_tx, job_rx) = crossbeam_channel::bounded::<Indexed<TranscriptionJob>>(num_jobs);
    let (outcome_tx, outcome_rx) =
      crossbeam_channel::unbounded::<Indexed<TranscriptionOutcome>>();

    let mut handles = Vec::with_capacity(num_threads);
    for id in 0..num_threads {
      let name = format!("transcriber-{}", id);
      let handle = self.spawn_worker(name.clone(), job_rx.clone(), outcome_tx.clone())?;
      handles.push((name, handle));
    }
    drop(outcome_tx);

    for (index, item) in jobs.into_iter().enumerate() {
      drop(job_tx.send(Indexed { index, item }));
    }
    drop(job_tx);

    let mut outcomes: Vec<Indexed<TranscriptionOutcome>> = outcome_rx.iter().collect();

    for (name, handle) in handles.into_iter() {
      handle.join().map_err(|_| WorkersError::Stop { name })?;
    }

    outcomes.sort_by_key(|outcome| outcome.index);
    Ok(outcomes.into_iter().map(|outcome| outcome.item).collect())
  }

  fn spawn_worker(
    &self,
    name: String,
    job_rx: Receiver<Indexed<TranscriptionJob>>,
    outcome_tx: Sender<Indexed<TranscriptionOutcome>>,
  ) -> Result<thread::JoinHandle<()>, WorkersError> {
    let transcriber = self.transcriber.clone();
    thread::Builder::new()
      .name(name)
      .spawn(move || {
        for Indexed { index, item: job } in job_rx.iter() {
          debug!("Transcribing {} from {:?}", job.instrument, job.audio);
          let result = transcriber.transcribe(&job.audio, &job.notes);
          if let Err(err) = &result {
            warn!("Transcription of {} failed: {}", job.instrument, err);
          }
          drop(outcome_tx.send(Indexed {
            index,
            item: TranscriptionOutcome { job, result },
          }));
        }
      })
      .map_err(|err| WorkersError::Start {
        cause: err.to_string(),
      })
  }
}

#[cfg(test)]
mod test {

  use super::{TranscriptionJob, TranscriptionWorkers};
  use crate::tools::{ToolError, ToolResult, Transcriber};
  use std::path::{Path, PathBuf};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use stemscribe_core::instrument::Instrument;

  struct FakeTranscriber {
    calls: AtomicUsize,
  }

  impl Transcriber for FakeTranscriber {
    fn transcribe(&self, audio: &Path, _notes: &Path) -> ToolResult<()> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if audio.to_string_lossy().contains("guitar") {
        Err(ToolError::Failed {
          program: "fake".to_string(),
          status: "exit status: 1".to_string(),
          stderr: "no guitar today".to_string(),
        })
      } else {
        Ok(())
      }
    }
  }

  fn job(instrument: Instrument) -> TranscriptionJob {
    TranscriptionJob {
      instrument,
      audio: PathBuf::from(format!("{}.mp3", instrument)),
      notes: PathBuf::from(format!("{}.midi", instrument)),
    }
  }

  #[test]
  pub fn no_jobs() {
    let transcriber = Arc::new(FakeTranscriber {
      calls: AtomicUsize::new(0),
    });
    let workers = TranscriptionWorkers::new(transcriber.clone(), 4);
    assert!(workers.run(Vec::new()).unwrap().is_empty());
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  pub fn failures_stay_with_their_job() {
    let transcriber = Arc::new(FakeTranscriber {
      calls: AtomicUsize::new(0),
    });
    let workers = TranscriptionWorkers::new(transcriber.clone(), 2);
    let jobs = vec![
      job(Instrument::Bass),
      job(Instrument::Guitar),
      job(Instrument::Piano),
    ];

    let outcomes = workers.run(jobs.clone()).unwrap();

    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 3);
    let returned: Vec<TranscriptionJob> =
      outcomes.iter().map(|outcome| outcome.job.clone()).collect();
    assert_eq!(returned, jobs);
    assert!(outcomes[0].result.is_ok());
    assert_eq!(
      outcomes[1].result.as_ref().err().and_then(ToolError::details),
      Some("no guitar today")
    );
    assert!(outcomes[2].result.is_ok());
  }

  #[test]
  pub fn single_thread() {
    let transcriber = Arc::new(FakeTranscriber {
      calls: AtomicUsize::new(0),
    });
    let workers = TranscriptionWorkers::new(transcriber, 0);
    let outcomes = workers
      .run(vec![job(Instrument::Piano), job(Instrument::Bass)])
      .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
  }
}
