pub mod event;
pub mod file;

pub use self::event::{EventKind, TimedEvent};
pub use self::file::{NoteFile, NoteFileError};
