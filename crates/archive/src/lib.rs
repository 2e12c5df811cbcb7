//! Source-distribution inspection.
//!
//! A source distribution is a tarball, possibly compressed with gzip or
//! bzip2 ([`Compression`]). When a release declares no requirements, the
//! setuptools `*.egg-info/requires.txt` nearest the archive root
//! ([`find_requires_txt`]) still lists them, one section per extra or
//! environment marker ([`parse_requires_txt`]).
//!
//! Zip files and eggs are reported as [`Unsupported`](error::ErrorKind::Unsupported)
//! and left for the caller to skip.

mod compression;
pub mod error;
mod requires;
mod sdist;

pub use crate::compression::Compression;
pub use crate::requires::parse_requires_txt;
pub use crate::sdist::{approximate_requirements, find_requires_txt};
