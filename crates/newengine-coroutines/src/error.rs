use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Engine-wide error.
///
/// The coroutine scheduler never fails; errors only come from configuration
/// loading and module lifecycle hooks.
#[derive(Debug)]
pub enum EngineError {
    /// Graceful shutdown was requested.
    ExitRequested,

    /// Error produced by a module during a known lifecycle stage.
    Module {
        module_id: &'static str,
        stage: ModuleStage,
        cause: Box<EngineError>,
    },

    /// Configuration file could not be read or parsed.
    Config { path: PathBuf, message: String },

    /// Generic error (fallback).
    Other(String),
}

/// Module lifecycle hook that produced an error.
///
/// `Init` and `Update` failures abort the current engine call; `Shutdown`
/// failures are logged and the remaining modules still shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStage {
    Init,
    Update,
    Shutdown,
}

impl EngineError {
    #[inline]
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn with_module_stage(module_id: &'static str, stage: ModuleStage, err: EngineError) -> Self {
        match err {
            EngineError::ExitRequested => EngineError::ExitRequested,
            other => EngineError::Module {
                module_id,
                stage,
                cause: Box::new(other),
            },
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ExitRequested => write!(f, "exit requested"),
            EngineError::Other(s) => write!(f, "{s}"),
            EngineError::Config { path, message } => {
                write!(f, "config error: path={path:?} {message}")
            }
            EngineError::Module {
                module_id,
                stage,
                cause,
            } => write!(f, "module '{module_id}' stage {stage:?}: {cause}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Module { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<&str> for EngineError {
    #[inline]
    fn from(value: &str) -> Self {
        EngineError::Other(value.to_string())
    }
}

impl From<String> for EngineError {
    #[inline]
    fn from(value: String) -> Self {
        EngineError::Other(value)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_request_is_not_wrapped_by_module_stage() {
        let err = EngineError::with_module_stage("probe", ModuleStage::Update, EngineError::ExitRequested);
        assert!(matches!(err, EngineError::ExitRequested));
    }

    #[test]
    fn module_error_keeps_cause_as_source() {
        let err = EngineError::with_module_stage("probe", ModuleStage::Init, "boom".into());
        assert_eq!(err.to_string(), "module 'probe' stage Init: boom");
        assert!(err.source().is_some());
    }
}
