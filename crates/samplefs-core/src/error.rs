// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for samplefs core

use std::io;

/// Core namespace error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("name too long")]
    NameTooLong,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid mount option: {0}")]
    InvalidOption(String),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("namespace is not mounted")]
    NotMounted,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported")]
    Unsupported,
}

impl FsError {
    /// POSIX errno equivalent, for hosts that report failures as error codes.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::DirectoryNotEmpty => libc::ENOTEMPTY,
            FsError::OutOfMemory => libc::ENOMEM,
            FsError::InvalidOption(_) | FsError::InvalidArgument => libc::EINVAL,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotMounted => libc::ENODEV,
            FsError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            FsError::Unsupported => libc::EOPNOTSUPP,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
