use thiserror::Error;
use vdec_types::abi;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdecError {
    #[error("{what} declares size {actual:#x}, expected {expected:#x}")]
    VersionMismatch {
        what: &'static str,
        expected: u64,
        actual: u64,
    },
    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),
    #[error("invalid {0} handle")]
    InvalidHandle(HandleKind),
    #[error("could not allocate {0}")]
    AllocationFailed(&'static str),
    #[error("invalid decoder config: {0}")]
    InvalidConfig(String),
    #[error("decode pipeline depth must be at least 1")]
    InvalidPipelineDepth,
    #[error("access unit is empty")]
    EmptyAccessUnit,
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
    #[error("runtime already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Decoder,
    ComputeQueue,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleKind::Decoder => write!(f, "decoder"),
            HandleKind::ComputeQueue => write!(f, "compute queue"),
        }
    }
}

impl VdecError {
    /// Status code reported across the ABI.
    pub fn status(&self) -> i32 {
        match self {
            VdecError::VersionMismatch { .. } => abi::ERROR_STRUCT_SIZE,
            VdecError::NullPointer(_) => abi::ERROR_ARGUMENT_POINTER,
            VdecError::InvalidHandle(HandleKind::Decoder) => abi::ERROR_DECODER_INSTANCE,
            VdecError::InvalidHandle(HandleKind::ComputeQueue) => abi::ERROR_ARGUMENT_POINTER,
            VdecError::AllocationFailed(_) => abi::ERROR_API_FAIL,
            VdecError::InvalidConfig(_) => abi::ERROR_CONFIG_INFO,
            VdecError::InvalidPipelineDepth => abi::ERROR_PIPELINE_DEPTH,
            VdecError::EmptyAccessUnit => abi::ERROR_ACCESS_UNIT,
            VdecError::Unimplemented(_) => abi::ERROR_API_FAIL,
            VdecError::AlreadyInitialized => abi::ERROR_API_FAIL,
        }
    }
}

/// Checks a declared struct size before anything else in the struct is read.
pub fn check_size(what: &'static str, expected: u64, actual: u64) -> Result<(), VdecError> {
    if actual != expected {
        return Err(VdecError::VersionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
