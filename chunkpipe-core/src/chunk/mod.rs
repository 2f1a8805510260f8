pub mod processor;
pub mod scan;

pub use processor::ChunkProcessor;
pub use scan::{RecordScanner, RecordSet, ScannedRecord};
