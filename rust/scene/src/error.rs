// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for scene structure operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A reference can carry exactly one representation
    #[error("reference {0} already has a representation")]
    RepresentationAlreadySet(u32),

    #[error("unknown reference id {0}")]
    UnknownReference(u32),

    #[error("unknown instance id {0}")]
    UnknownInstance(u32),

    #[error(transparent)]
    Geometry(#[from] cadrep_geometry::Error),
}
