//! Error types for registry operations.

use thiserror::Error;

/// Errors from registering or querying providers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider with the same ID already exists
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// No provider with the given ID exists
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// Configuration names a provider for which no adapter was supplied
    #[error("No adapter registered for configured provider '{0}'")]
    AdapterMissing(String),
}
