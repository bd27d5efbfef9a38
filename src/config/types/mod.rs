mod error;

pub use error::{ConfigDiagnostics, ConfigError};
