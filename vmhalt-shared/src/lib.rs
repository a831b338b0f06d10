//! Types shared between vmhalt crates.

pub mod errors;

pub use errors::{VmhaltError, VmhaltResult};
