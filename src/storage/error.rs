use std::fmt;
use std::io;
use std::path::Path;

use thiserror::Error;

/// The storage call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Open,
    Metadata,
    Truncate,
    Write,
    Read,
    Flush,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageOp::Open => "open",
            StorageOp::Metadata => "metadata",
            StorageOp::Truncate => "truncate",
            StorageOp::Write => "write",
            StorageOp::Read => "read",
            StorageOp::Flush => "flush",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    /// An I/O failure, with the native error kind and OS code if any.
    #[error("{op} {path} failed: {kind:?}{}", os_suffix(.code))]
    Io {
        op: StorageOp,
        path: String,
        kind: io::ErrorKind,
        code: Option<i32>,
    },

    #[error("short read on {path}: wanted {expected} bytes, got {found}")]
    ShortRead {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("path traversal detected in file path: {0}")]
    PathTraversal(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

fn os_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (os error {})", c)).unwrap_or_default()
}

impl StorageError {
    pub fn io(op: StorageOp, path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return StorageError::NotFound(path.display().to_string());
        }
        StorageError::Io {
            op,
            path: path.display().to_string(),
            kind: err.kind(),
            code: err.raw_os_error(),
        }
    }

    /// Name of the native error, e.g. `PermissionDenied`.
    pub fn kind_name(&self) -> String {
        match self {
            StorageError::NotFound(_) => "NotFound".to_string(),
            StorageError::Io { kind, .. } => format!("{:?}", kind),
            StorageError::ShortRead { .. } => "UnexpectedEof".to_string(),
            StorageError::PathTraversal(_) => "InvalidInput".to_string(),
            StorageError::Unavailable(_) => "Unavailable".to_string(),
        }
    }

    pub fn os_code(&self) -> Option<i32> {
        match self {
            StorageError::Io { code, .. } => *code,
            _ => None,
        }
    }
}
