use thiserror::Error;
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("serial port {port} unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },
    #[error("device did not signal ready within {timeout_ms} ms")]
    HandshakeTimeout { timeout_ms: u64 },
    #[error("faulty serial communication: {line}")]
    MalformedLine { line: String },
    #[error("reading from the serial port failed: {0}")]
    ReadFailure(#[source] std::io::Error),
    #[error("error saving data: {0}")]
    PersistenceFailure(#[source] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("file access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl AcquisitionError {
    /// Only handshake and transport failures end a session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcquisitionError::HandshakeTimeout { .. } | AcquisitionError::ReadFailure(_)
        )
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AcquisitionError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AcquisitionError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for AcquisitionError {
    fn from(value: image::ImageError) -> Self {
        AcquisitionError::Plot(value.to_string())
    }
}
