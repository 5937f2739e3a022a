pub mod error;
pub mod models;
pub mod payload;

pub use error::{Error, Result};
pub use models::{
    Application, Deploy, LogEntry, NameBounds, UpdateApplication, MAX_APP_NAME_LEN,
    MIN_APP_NAME_LEN,
};
