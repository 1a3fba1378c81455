use std::fs;
use std::path::{Component, Path, PathBuf};

use failure::Fail;

#[derive(Debug, Fail, PartialEq)]
pub enum LayoutError {
  #[fail(display = "Invalid file path: {}", path)]
  Traversal { path: String },

  #[fail(display = "Invalid upload name: {:?}", name)]
  InvalidName { name: String },

  #[fail(display = "Failed to list stems in {}: {}", path, cause)]
  List { path: String, cause: String },
}

pub type LayoutResult<T> = Result<T, LayoutError>;

/// Where stems and their note files live on disk.
///
/// `<root>/<output id>/<label>.<audio extension>` for separated audio and
/// `<root>/<output id>/<label>.<note extension>` for transcriptions.
#[derive(Debug, Clone)]
pub struct StemLayout {
  root: PathBuf,
  audio_extension: String,
  note_extension: String,
}

impl StemLayout {
  pub fn new<P, A, N>(root: P, audio_extension: A, note_extension: N) -> StemLayout
  where
    P: Into<PathBuf>,
    A: Into<String>,
    N: Into<String>,
  {
    StemLayout {
      root: root.into(),
      audio_extension: audio_extension.into(),
      note_extension: note_extension.into(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn audio_extension(&self) -> &str {
    &self.audio_extension
  }

  pub fn note_extension(&self) -> &str {
    &self.note_extension
  }

  /// The file name an upload is stored under: its last path component only.
  pub fn upload_name(file_name: &str) -> LayoutResult<String> {
    Path::new(file_name)
      .file_name()
      .and_then(|name| name.to_str())
      .map(str::to_string)
      .filter(|name| !name.is_empty())
      .ok_or_else(|| LayoutError::InvalidName {
        name: file_name.to_string(),
      })
  }

  /// Upload base name without extension, which keys the stem directory.
  pub fn output_id(file_name: &str) -> LayoutResult<String> {
    let name = Self::upload_name(file_name)?;
    Path::new(&name)
      .file_stem()
      .and_then(|stem| stem.to_str())
      .map(str::to_string)
      .filter(|stem| !stem.is_empty())
      .ok_or_else(|| LayoutError::InvalidName {
        name: file_name.to_string(),
      })
  }

  pub fn stem_dir(&self, output_id: &str) -> PathBuf {
    self.root.join(output_id)
  }

  pub fn audio_file_name(&self, label: &str) -> String {
    format!("{}.{}", label, self.audio_extension)
  }

  pub fn note_file_name(&self, label: &str) -> String {
    format!("{}.{}", label, self.note_extension)
  }

  pub fn audio_path(&self, output_id: &str, label: &str) -> PathBuf {
    self.stem_dir(output_id).join(self.audio_file_name(label))
  }

  pub fn note_path(&self, output_id: &str, label: &str) -> PathBuf {
    self.stem_dir(output_id).join(self.note_file_name(label))
  }

  /// Path relative to the root, as handed out to clients.
  pub fn public_path(&self, output_id: &str, file_name: &str) -> String {
    format!("{}/{}", output_id, file_name)
  }

  /// Maps a client supplied relative path into the root.
  pub fn resolve(&self, relative: &str) -> LayoutResult<PathBuf> {
    let path = Path::new(relative);
    let escapes = path.components().any(|component| match component {
      Component::Normal(_) | Component::CurDir => false,
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => true,
    });

    if escapes || relative.is_empty() {
      Err(LayoutError::Traversal {
        path: relative.to_string(),
      })
    } else {
      Ok(self.root.join(path))
    }
  }

  /// Audio stems found in an output directory, sorted by file name.
  pub fn stems(&self, output_id: &str) -> LayoutResult<Vec<PathBuf>> {
    let dir = self.stem_dir(output_id);
    let entries = fs::read_dir(&dir).map_err(|err| LayoutError::List {
      path: dir.display().to_string(),
      cause: err.to_string(),
    })?;

    let mut stems: Vec<PathBuf> = entries
      .filter_map(Result::ok)
      .map(|entry| entry.path())
      .filter(|path| path.is_file() && self.is_audio(path))
      .collect();
    stems.sort();
    Ok(stems)
  }

  fn is_audio(&self, path: &Path) -> bool {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.eq_ignore_ascii_case(&self.audio_extension))
      .unwrap_or(false)
  }
}

#[cfg(test)]
mod test {

  use super::{LayoutError, StemLayout};
  use std::fs;
  use std::path::PathBuf;

  fn layout() -> StemLayout {
    StemLayout::new("/data/separated/htdemucs_6s", "mp3", "midi")
  }

  #[test]
  pub fn paths() {
    let layout = layout();
    assert_eq!(
      layout.audio_path("song", "piano"),
      PathBuf::from("/data/separated/htdemucs_6s/song/piano.mp3")
    );
    assert_eq!(
      layout.note_path("song", "bass"),
      PathBuf::from("/data/separated/htdemucs_6s/song/bass.midi")
    );
    assert_eq!(layout.public_path("song", "bass.midi"), "song/bass.midi");
  }

  #[test]
  pub fn output_id_from_upload() {
    assert_eq!(StemLayout::output_id("My Song.mp3").unwrap(), "My Song");
    assert_eq!(StemLayout::output_id("archive.tar.gz").unwrap(), "archive.tar");
    assert_eq!(StemLayout::output_id("../../etc/song.wav").unwrap(), "song");
    assert_eq!(StemLayout::upload_name("../../etc/song.wav").unwrap(), "song.wav");
    assert!(StemLayout::output_id("").is_err());
    assert!(StemLayout::output_id("..").is_err());
  }

  #[test]
  pub fn resolve_inside_root() {
    assert_eq!(
      layout().resolve("song/piano.mp3").unwrap(),
      PathBuf::from("/data/separated/htdemucs_6s/song/piano.mp3")
    );
    assert_eq!(
      layout().resolve("./song/piano.mp3").unwrap(),
      PathBuf::from("/data/separated/htdemucs_6s/song/piano.mp3")
    );
  }

  #[test]
  pub fn resolve_rejects_parent_segments() {
    for path in &["../secret", "song/../../secret", "song/..", "/etc/passwd", ""] {
      assert_eq!(
        layout().resolve(path),
        Err(LayoutError::Traversal {
          path: path.to_string()
        })
      );
    }
  }

  #[test]
  pub fn stems_lists_audio_only() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StemLayout::new(dir.path(), "mp3", "midi");
    let stem_dir = layout.stem_dir("song");
    fs::create_dir_all(&stem_dir).unwrap();
    for name in &["vocals.mp3", "bass.mp3", "bass.midi", "notes.txt"] {
      fs::write(stem_dir.join(name), b"x").unwrap();
    }

    let stems = layout.stems("song").unwrap();
    assert_eq!(
      stems,
      vec![stem_dir.join("bass.mp3"), stem_dir.join("vocals.mp3")]
    );
  }

  #[test]
  pub fn stems_of_missing_output() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StemLayout::new(dir.path(), "mp3", "midi");
    match layout.stems("nothing") {
      Err(LayoutError::List { .. }) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }
}
