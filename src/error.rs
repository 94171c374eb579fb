use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad particle count, zero-sized image, or sample coordinates out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Adapter, device or surface could not be created or reconfigured.
    #[error("Failed to acquire graphics resource: {0}")]
    ResourceAcquisition(String),
    #[error("Frame capture failed: {0}")]
    Capture(String),
}

pub type Result<T> = std::result::Result<T, Error>;
