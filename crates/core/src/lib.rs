//! Domain types shared between the HTTP application and the storage layer.

pub mod types;
