// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid PCI address {address:?} (expected [dddd:]bb:dd.f)")]
    InvalidAddress { address: String },

    #[error("{path:?} does not exist")]
    NotFound { path: PathBuf },

    #[error("failed to parse {content:?} read from {path:?} as an integer")]
    ParseError {
        path: PathBuf,
        content: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("kernel rejected write to {path:?}: {source}")]
    ConfigurationRejected {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Classifies a failed read, stat or readlink on `path`.
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Error::not_found(path),
            _ => Error::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Classifies a failed write to a sysfs control file on `path`.
    pub(crate) fn from_write(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Error::not_found(path),
            _ => Error::ConfigurationRejected {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
