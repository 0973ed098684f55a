use thiserror::Error;

/// Errors surfaced by module operations.
///
/// Every failure is request-scoped: the module state is left exactly as it was
/// before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    /// Malformed or unsatisfiable request (unknown id, bad list, unsupported format)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Request conflicts with the current graph state
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl HalError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

/// Convenience Result type for module operations
pub type Result<T> = std::result::Result<T, HalError>;

/// Log the failure and build an `InvalidArgument` error.
macro_rules! invalid_argument {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::error!("{}", msg);
        $crate::hal::error::HalError::InvalidArgument(msg)
    }};
}

/// Log the failure and build an `IllegalState` error.
macro_rules! illegal_state {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::error!("{}", msg);
        $crate::hal::error::HalError::IllegalState(msg)
    }};
}

pub(crate) use illegal_state;
pub(crate) use invalid_argument;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_predicates() {
        let err = HalError::InvalidArgument("port id 7 not found".to_string());
        assert!(err.is_invalid_argument());
        assert!(!err.is_illegal_state());
        assert_eq!(err.to_string(), "Invalid argument: port id 7 not found");

        let err = HalError::IllegalState("sink port id 1 is busy".to_string());
        assert!(err.is_illegal_state());
    }

    #[test]
    fn test_macros_build_matching_variant() {
        let err = invalid_argument!("patch id {} not found", 3);
        assert_eq!(err, HalError::InvalidArgument("patch id 3 not found".to_string()));

        let err = illegal_state!("port config id {} has a stream opened on it", 9);
        assert!(err.is_illegal_state());
    }
}
