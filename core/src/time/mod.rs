pub mod ticks;

pub use self::ticks::{TicksTime, DEFAULT_TICKS_PER_BEAT, MAX_TICKS_PER_BEAT};
