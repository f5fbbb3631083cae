//! Image hosting backends.

pub mod local;

pub use local::LocalImageHost;
