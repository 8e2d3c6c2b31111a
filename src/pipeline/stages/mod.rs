// src/pipeline/stages/mod.rs

//! Built-in transform stages.
//!
//! - [`Passthrough`] passes artifacts through untouched.
//! - [`Concat`] joins every input into one file (a minimal bundler).
//! - [`Shell`] pipes each artifact through an external command.
//! - [`Check`] runs an external checker (e.g. a linter) per artifact and
//!   fails the stage on a non-zero exit, without changing content.
//! - [`Scss`] compiles stylesheets (feature `grass`).
//! - [`Reencode`] decodes and re-encodes images (feature `image`).

mod concat;
mod passthrough;
mod shell;

#[cfg(feature = "image")]
mod reencode;
#[cfg(feature = "grass")]
mod scss;

pub use concat::Concat;
pub use passthrough::Passthrough;
pub use shell::{Check, Shell};

#[cfg(feature = "image")]
pub use reencode::Reencode;
#[cfg(feature = "grass")]
pub use scss::Scss;
