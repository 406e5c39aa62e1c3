//! Service layer: image I/O and output encoding, kept apart from the pipeline

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
