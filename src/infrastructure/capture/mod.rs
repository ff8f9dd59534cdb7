//! Capture adapters

pub mod command;

pub use command::CommandCapture;
