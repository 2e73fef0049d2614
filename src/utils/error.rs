//! Error handling for manuscript conversions
//!
//! This module provides a unified error type and result type for the
//! front-end conversion operations, plus a dedicated error type for the
//! external PDF rendering pipeline.

use std::fmt;

/// Conversion error type
#[derive(Debug, Clone)]
pub enum ConversionError {
    /// Invalid input (empty manuscript, unreadable metadata)
    InvalidInput { message: String },
    /// IO error (for file operations)
    IoError { message: String },
    /// Internal error
    InternalError { message: String },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            ConversionError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
            ConversionError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

// Convenience constructors for errors
impl ConversionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConversionError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ConversionError::InternalError {
            message: message.into(),
        }
    }
}

/// Error type for the external PDF rendering pipeline.
///
/// A missing toolchain binary is kept distinct from a compilation failure so
/// callers can tell "tool not installed" apart from "tool failed to compile
/// this input".
#[derive(Debug, Clone)]
pub enum RenderError {
    /// The TeX toolchain binary could not be found on this system
    ToolchainMissing { binary: String },
    /// The toolchain ran but produced no PDF artifact
    CompilationFailed {
        message: String,
        diagnostics: Vec<String>,
    },
    /// Workspace setup failed before any pass could run
    Io { message: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ToolchainMissing { binary } => {
                write!(
                    f,
                    "TeX toolchain binary '{}' is not installed or not on PATH",
                    binary
                )
            }
            RenderError::CompilationFailed {
                message,
                diagnostics,
            } => {
                write!(f, "{}", message)?;
                for line in diagnostics {
                    write!(f, "\n  {}", line)?;
                }
                Ok(())
            }
            RenderError::Io { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for RenderError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io {
            message: err.to_string(),
        }
    }
}

impl RenderError {
    pub fn failed(message: impl Into<String>, diagnostics: Vec<String>) -> Self {
        RenderError::CompilationFailed {
            message: message.into(),
            diagnostics,
        }
    }

    /// Diagnostic lines extracted from the toolchain log, if any.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            RenderError::CompilationFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = ConversionError::invalid("empty manuscript");
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("empty manuscript"));
    }

    #[test]
    fn test_toolchain_missing_names_binary() {
        let err = RenderError::ToolchainMissing {
            binary: "pdflatex".to_string(),
        };
        assert!(err.to_string().contains("pdflatex"));
    }

    #[test]
    fn test_render_error_diagnostics() {
        let err = RenderError::failed(
            "compilation produced no PDF",
            vec!["! Undefined control sequence.".to_string()],
        );
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.to_string().contains("Undefined control sequence"));
    }
}
