//! Object identity and hash computation for the gitdb object database.
//!
//! Provides the 20-byte [`ObjectId`] with its hex codec, a streaming SHA-1
//! [`hasher::Hasher`], and the [`fanout::FanoutTable`] used by pack indexes.

mod error;
mod oid;
pub mod fanout;
pub mod hasher;

pub use error::HashError;
pub use oid::ObjectId;
