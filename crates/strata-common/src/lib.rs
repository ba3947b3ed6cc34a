pub mod error;

pub use error::{Direction, Error, MigrationError, Result};
