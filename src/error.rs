//! Unified error types for macvland

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// IP address family of a subnet or gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::V4 => write!(f, "ipv4"),
            Family::V6 => write!(f, "ipv6"),
        }
    }
}

/// Main error type for macvland operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    // Registry errors
    #[error("Invalid network id '{0}'")]
    InvalidNetworkId(String),

    #[error("Network '{0}' not found")]
    NetworkNotFound(String),

    #[error("Network '{0}' already exists")]
    NetworkAlreadyExists(String),

    #[error("Invalid endpoint id '{0}'")]
    InvalidEndpointId(String),

    #[error("Could not find endpoint with id {0}")]
    EndpointNotFound(String),

    #[error("Endpoint '{0}' already exists")]
    EndpointAlreadyExists(String),

    #[error("Endpoint {0} was replaced while joining")]
    EndpointReplaced(String),

    // Binding errors
    #[error("Endpoint {0} is already joined or joining")]
    AlreadyJoined(String),

    #[error("Endpoint {0} is not joined to a sandbox")]
    EndpointNotJoined(String),

    #[error("Could not find a valid {family} subnet for endpoint {endpoint}")]
    ConfigurationMismatch { endpoint: String, family: Family },

    #[error("Gateway {gateway} is not a valid {family} address for endpoint {endpoint}")]
    InvalidGateway {
        endpoint: String,
        gateway: String,
        family: Family,
    },

    #[error("Failed to set up interface for endpoint {endpoint}: {message}")]
    ResourceCreation { endpoint: String, message: String },

    #[error("Failed to save macvlan endpoint {endpoint} to store: {message}")]
    Persistence { endpoint: String, message: String },

    #[error("Failed to record binding for endpoint {endpoint}: {message}")]
    Binding { endpoint: String, message: String },

    #[error("Join info rejected: {0}")]
    JoinInfo(String),

    #[error("Failed to configure sandbox for endpoint {endpoint}: {message}")]
    Sandbox { endpoint: String, message: String },

    // Interface errors
    #[error("Link error: {0}")]
    Link(String),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("Failed to encode endpoint record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    ConfigurationMismatch,
    ResourceCreation,
    Persistence,
    Config,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NetworkNotFound(_)
            | Error::EndpointNotFound(_)
            | Error::EndpointNotJoined(_) => ErrorKind::NotFound,
            Error::InvalidNetworkId(_)
            | Error::InvalidEndpointId(_)
            | Error::JoinInfo(_)
            | Error::Sandbox { .. } => ErrorKind::InvalidArgument,
            Error::NetworkAlreadyExists(_)
            | Error::EndpointAlreadyExists(_)
            | Error::EndpointReplaced(_)
            | Error::AlreadyJoined(_) => ErrorKind::Conflict,
            Error::ConfigurationMismatch { .. } | Error::InvalidGateway { .. } => {
                ErrorKind::ConfigurationMismatch
            }
            Error::ResourceCreation { .. } | Error::Link(_) | Error::CommandFailed { .. } => {
                ErrorKind::ResourceCreation
            }
            Error::Persistence { .. }
            | Error::Binding { .. }
            | Error::Store(_)
            | Error::Json(_) => ErrorKind::Persistence,
            Error::ConfigRead { .. } | Error::ConfigParse(_) | Error::ConfigValidation(_) => {
                ErrorKind::Config
            }
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for macvland operations
pub type Result<T> = std::result::Result<T, Error>;
