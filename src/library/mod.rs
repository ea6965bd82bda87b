// Clip library module
// Clip records, directory scanning and import validation

pub mod clip;
pub mod importer;
pub mod scanner;

pub use clip::Clip;
pub use importer::{import_files, ImportResult};
pub use scanner::DirectoryScanner;
