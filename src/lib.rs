//! Nearby points of interest from Wikipedia, with favorites, offline
//! downloads, visit history and persisted user settings.

pub mod config;
pub mod content;
pub mod settings;
pub mod storage;
pub mod util;
