use thiserror::Error;

/// Everything that can go wrong while analyzing one bill file.
///
/// Each variant is caught at the per-file boundary and recorded on that
/// file's entry; it never aborts the processing of sibling files.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// The API key is missing from the deployment configuration.
    /// Raised before any network I/O is attempted.
    #[error("API key is not configured")]
    Configuration,

    /// The attachment-registration call failed (transport error, non-2xx
    /// status, or a success response without an attachment id).
    #[error("attachment upload failed: {0}")]
    Upload(String),

    /// The completion call failed (transport error or non-2xx status).
    #[error("extraction request failed: {0}")]
    ExtractionEndpoint(String),

    /// The completion call succeeded but the reply text was not valid JSON
    /// after fence-stripping. `raw` holds the cleaned text for debugging.
    #[error("model reply is not valid JSON: {raw}")]
    MalformedResponse { raw: String },
}
