use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No pixel source for placement '{name}'")]
    MissingSource { name: String },
    #[error("Size mismatch for '{name}': placement (w, h) is {expected:?}, source is {actual:?}")]
    SizeMismatch {
        name: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AtlasError>;

/// Attaches a description of the failed operation to an `io::Error`.
pub(crate) trait IoContext<T> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, std::io::Error> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|source| AtlasError::Io {
            context: context().into(),
            source,
        })
    }
}
