// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry construction and rendering
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Matrix is singular or near-singular")]
    SingularMatrix,

    #[error("Triangulation failed: {0}")]
    Triangulation(String),

    #[error("Render backend failed in {operation} (native code {code})")]
    Render { operation: &'static str, code: i32 },

    #[error("Chunk id mismatch: expected {expected:#06x}, found {found:#06x}")]
    ChunkMismatch { expected: u32, found: u32 },

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Corrupt stream: {0}")]
    Corrupt(String),
}
