//! A minimal Debug Adapter Protocol server driving a synthetic debuggee that
//! walks the lines of a source document.

pub mod config;
pub mod dap;
pub mod debugger;
pub mod error;
mod executor;
pub mod logging;
