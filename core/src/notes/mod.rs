pub mod extractor;
pub mod merger;

pub use self::extractor::{extract_notes, NoteExtractor, NoteRecord};
pub use self::merger::{CombinedStream, MergeError, Track, TrackMerger};
