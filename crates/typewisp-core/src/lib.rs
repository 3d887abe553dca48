pub mod config;
pub mod error;
pub mod types;

pub use config::TypewispConfig;
pub use error::{InjectionError, Result, TranscriptionError, TypewispError};
pub use types::*;
