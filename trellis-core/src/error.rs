//! Error types for the Trellis runtime.
//!
//! Most failures at the outer API edge are *usage errors*: they are formatted
//! through [`Error`], logged as warnings and the offending operation becomes a
//! no-op. Only setup failures and configuration parsing surface as `Err`.

use thiserror::Error;

/// Errors produced by the Trellis runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A mount call referenced a selector that matched no node.
    #[error("mount target `{0}` was not found")]
    MountTargetNotFound(String),

    /// A composition helper was called while no component was being set up.
    #[error("`{0}` can only be called during component setup")]
    OutsideSetup(&'static str),

    /// No ancestor component or app provided the requested key.
    #[error("injection `{0}` was not found")]
    InjectionNotFound(String),

    /// A provided value exists but has a different type than requested.
    #[error("injection `{0}` has a different type than requested")]
    InjectionTypeMismatch(String),

    /// A component reference by name could not be resolved.
    #[error("failed to resolve component `{0}`")]
    UnknownComponent(String),

    /// A method was called that the component does not define.
    #[error("method `{method}` is not defined on component `{component}`")]
    UnknownMethod {
        /// Name of the component.
        component: String,
        /// Name of the missing method.
        method: String,
    },

    /// A component defines neither a setup render function nor a render option.
    #[error("component `{0}` is missing a render function")]
    MissingRender(String),

    /// A setup function failed.
    #[error("setup of component `{component}` failed: {message}")]
    Setup {
        /// Name of the component whose setup failed.
        component: String,
        /// Human readable failure description.
        message: String,
    },

    /// A runtime configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Build a setup failure for the named component.
    pub fn setup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the usage taxonomy (warn and continue).
    pub fn is_usage(&self) -> bool {
        !matches!(self, Self::Setup { .. } | Self::Config(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Log a usage error. The caller turns the operation into a no-op.
pub(crate) fn warn_usage(error: Error) {
    tracing::warn!(%error, "ignored invalid runtime usage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_are_classified() {
        assert!(Error::MountTargetNotFound("#app".into()).is_usage());
        assert!(Error::OutsideSetup("on_mounted").is_usage());
        assert!(!Error::setup("Counter", "boom").is_usage());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = Error::UnknownMethod {
            component: "Counter".into(),
            method: "increment".into(),
        };
        assert_eq!(
            err.to_string(),
            "method `increment` is not defined on component `Counter`"
        );
        assert_eq!(
            Error::setup("Counter", "boom").to_string(),
            "setup of component `Counter` failed: boom"
        );
    }
}
