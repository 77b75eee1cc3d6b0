pub mod config;
pub mod error;
pub mod intake;
pub mod io;
pub mod paths;
pub mod registry;
pub mod retention;
pub mod run;
pub mod snapshot;
pub mod tokens;
pub mod toolchain;
pub mod types;

pub use error::{ClonekitError, Result};
