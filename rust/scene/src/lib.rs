//! CADRep Scene Structure
//!
//! Reference/instance ownership for assemblies: one arena owns shared
//! geometric definitions and the instances placed from them, keyed by id.

pub mod error;
pub mod representation;
pub mod structure;

pub use error::{Error, Result};
pub use representation::{Rep3d, Representation};
pub use structure::{InstanceId, ReferenceId, StructInstance, StructReference, StructureArena};
