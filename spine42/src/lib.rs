//! Pure Rust runtime for Spine 4.2 binary skeletons (unofficial).
//!
//! Decodes `.skel` exports into immutable [`SkeletonData`], poses [`Skeleton`] instances
//! with animations and constraints, and clips attachment geometry with
//! [`SkeletonClipper`]. The crate is renderer-agnostic.

#![forbid(unsafe_code)]

mod atlas;
mod attachment;
mod config;
mod error;
mod geometry;
mod model;
mod runtime;
mod timeline;
mod version;

pub mod binary;

pub use atlas::*;
pub use attachment::*;
pub use binary::SkeletonBinary;
pub use config::*;
pub use error::*;
pub use geometry::*;
pub use model::*;
pub use runtime::*;
pub use timeline::*;
pub use version::*;


#[cfg(test)]
mod binary_tests;


#[cfg(test)]
mod timeline_tests;
