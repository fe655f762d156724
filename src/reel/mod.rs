pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
mod ffmpeg;
mod frames;
mod job;
mod mux;
mod progress;
mod raster;
mod recognizer;
mod segment;
mod srt;
mod store;
mod timecode;
mod timeline;
mod utils;

pub use cli::ReelCommands;
pub use commands::handle_reel_command;
pub use config::ReelConfig;
pub use error::ReelError;
