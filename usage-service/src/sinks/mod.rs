pub mod reading_import;

pub use reading_import::ReadingImportSink;
