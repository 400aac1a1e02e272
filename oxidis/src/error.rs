//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

use crate::network::MulticastAddr;

// IS-IS errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Configuration
    NoInterfaces,
    TooManyInterfaces(usize),
    DuplicateInterface(String),
    InterfaceStartError(String, Box<Error>),
}

// IS-IS I/O errors.
#[derive(Debug)]
pub enum IoError {
    SocketError(std::io::Error),
    InterfaceNotFound(String),
    MulticastJoinError(MulticastAddr, std::io::Error),
    RecvError(std::io::Error),
    RecvMissingSourceAddr,
    SendError(std::io::Error),
    PollError(std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::NoInterfaces => {
                error!("{}", self);
            }
            Error::TooManyInterfaces(count) => {
                error!(%count, "{}", self);
            }
            Error::DuplicateInterface(name) => {
                error!(%name, "{}", self);
            }
            Error::InterfaceStartError(name, error) => {
                error!(%name, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::NoInterfaces => {
                write!(f, "no interfaces configured")
            }
            Error::TooManyInterfaces(..) => {
                write!(f, "too many interfaces for the Circuit ID space")
            }
            Error::DuplicateInterface(..) => {
                write!(f, "interface configured more than once")
            }
            Error::InterfaceStartError(..) => {
                write!(f, "failed to start interface")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::InterfaceStartError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::SocketError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::InterfaceNotFound(name) => {
                warn!(%name, "{}", self);
            }
            IoError::MulticastJoinError(addr, error) => {
                warn!(?addr, error = %with_source(error), "{}", self);
            }
            IoError::RecvError(error)
            | IoError::SendError(error)
            | IoError::PollError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::RecvMissingSourceAddr => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::SocketError(..) => {
                write!(f, "failed to create raw socket")
            }
            IoError::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            IoError::MulticastJoinError(..) => {
                write!(f, "failed to join multicast group")
            }
            IoError::RecvError(..) => {
                write!(f, "failed to receive packet")
            }
            IoError::RecvMissingSourceAddr => {
                write!(
                    f,
                    "failed to retrieve source address from received packet"
                )
            }
            IoError::SendError(..) => {
                write!(f, "failed to send packet")
            }
            IoError::PollError(..) => {
                write!(f, "failed to poll socket readiness")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::SocketError(error)
            | IoError::MulticastJoinError(_, error)
            | IoError::RecvError(error)
            | IoError::SendError(error)
            | IoError::PollError(error) => Some(error),
            _ => None,
        }
    }
}

// ===== helper functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
