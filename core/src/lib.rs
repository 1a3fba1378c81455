pub mod config;
pub mod instrument;
pub mod layout;
pub mod midi;
pub mod notes;
pub mod time;
