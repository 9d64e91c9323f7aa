//! Credential verification for the login endpoint.

mod directory;

pub use directory::InMemoryDirectory;
