use thiserror::Error;

#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shape error: {0}")]
    ShapeError(String),

    #[error("Document open error: {0}")]
    DocumentOpenError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Mismatched edge error: {0}")]
    MismatchedEdgeError(String),

    #[error("Image XObject error: {0}")]
    ImageXObjectError(String),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`Pdf2ImgError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl Pdf2ImgError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create a raster shape error.
    shape => ShapeError,
    /// Create a document open error.
    document_open => DocumentOpenError,
    /// Create a raster decode error.
    decode => DecodeError,
    /// Create a mismatched edge error.
    mismatched_edge => MismatchedEdgeError,
    /// Create an image XObject error.
    image_xobject => ImageXObjectError,
    /// Create a write error.
    write => WriteError,
}

impl From<lopdf::Error> for Pdf2ImgError {
    fn from(e: lopdf::Error) -> Self {
        Self::DocumentOpenError(e.to_string())
    }
}

impl From<serde_yml::Error> for Pdf2ImgError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for Pdf2ImgError {
    fn from(e: serde_json::Error) -> Self {
        Self::WriteError(e.to_string())
    }
}

impl From<image::ImageError> for Pdf2ImgError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Pdf2ImgError>;
