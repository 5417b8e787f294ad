//! Building blocks for [`clap`]-driven configuration options.
#![warn(missing_docs)]

pub mod catalog;
pub mod executor;
pub mod logging;
