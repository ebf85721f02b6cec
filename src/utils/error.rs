// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error reading document: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("PDF parsing failed for {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Document has no pages: {0}")]
    Empty(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid fiscal period token: {0}")]
    InvalidPeriod(String),

    #[error("Table backend '{backend}' failed on page {page}: {message}")]
    Backend {
        backend: String,
        page: usize,
        message: String,
    },

    #[error("Table rejected: {0}")]
    TableRejected(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("File not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document could not be loaded: {0}")]
    Document(#[from] DocumentError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
