//! The wordcount service: wires settings, collaborators and the pipeline together.
mod app;
pub mod logging;
mod persistence;
pub mod settings;
mod shutdown;

pub use app::run;
