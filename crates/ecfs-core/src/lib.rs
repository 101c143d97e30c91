pub mod config;
pub mod error;
pub mod types;

pub use error::{EcfsError, EcfsResult, ErrorKind};
pub use types::{DirHash, FileKind};
