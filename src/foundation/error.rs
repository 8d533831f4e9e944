/// Convenience result type used across the engine.
pub type MontageResult<T> = Result<T, MontageError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// Invalid user-provided composition or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while probing or decoding source media.
    #[error("media error: {0}")]
    Media(String),

    /// Errors while compositing or encoding output frames.
    #[error("render error: {0}")]
    Render(String),

    /// The running operation observed a cancellation request.
    ///
    /// This is an internal control-flow signal: the export session translates it into the
    /// `Cancelled` terminal state rather than surfacing it as a failure.
    #[error("operation cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::Media`] value.
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Build a [`MontageError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_taxonomy_prefix() {
        assert!(
            MontageError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(MontageError::media("x").to_string().contains("media error:"));
        assert!(
            MontageError::render("x")
                .to_string()
                .contains("render error:")
        );
    }

    #[test]
    fn anyhow_wraps_transparently() {
        let err: MontageError = anyhow::anyhow!("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
