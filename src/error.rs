//! Error types for rendering.
//!
//! Component code is fallible through [`anyhow::Result`]; those errors never
//! escape the renderer (see the catch-or-log policy in [`crate::render`]).
//! [`RenderError`] covers the system and configuration failures that do.

/// Errors surfaced by the renderer and its HTTP integration.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Request-bound state was read while rendering without it.
    ///
    /// Returned by accessors such as [`Scope::request`](crate::Scope::request)
    /// when the render was started without the corresponding option.
    #[error("missing render context: {what} is not available in this render")]
    MissingContext {
        /// Which piece of context was requested.
        what: &'static str,
    },

    /// Session options were supplied without a signing secret.
    #[error("session requires a signing secret")]
    MissingSessionSecret,

    /// A sub-fetch named a component that is neither passed in the options
    /// nor present in the global registry.
    #[error("unknown component: {name}")]
    UnknownComponent {
        /// The requested component name or id.
        name: String,
    },

    /// The `x-props` header could not be decoded.
    #[error("invalid component props: {0}")]
    InvalidProps(String),

    /// The `x-flags` header could not be parsed.
    #[error("invalid flags: {0}")]
    InvalidFlags(String),

    /// Building the HTTP response failed.
    #[error(transparent)]
    Http(#[from] http::Error),
}

impl RenderError {
    /// Shorthand for [`RenderError::MissingContext`].
    pub fn missing(what: &'static str) -> Self {
        RenderError::MissingContext { what }
    }
}

impl From<base64::DecodeError> for RenderError {
    fn from(err: base64::DecodeError) -> Self {
        RenderError::InvalidProps(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::InvalidProps(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_context_message() {
        let err = RenderError::missing("request");
        assert_eq!(
            err.to_string(),
            "missing render context: request is not available in this render"
        );
    }

    #[test]
    fn test_render_error_into_anyhow() {
        fn component_body() -> anyhow::Result<()> {
            Err(RenderError::missing("session"))?;
            Ok(())
        }
        let err = component_body().unwrap_err();
        assert!(err.downcast_ref::<RenderError>().is_some());
    }
}
