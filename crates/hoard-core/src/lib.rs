pub mod config;
pub mod encoding;
pub mod error;
pub mod reference;
pub mod types;

pub use error::{HoardError, HoardResult};
pub use reference::{RefType, Reference};
pub use types::{Header, Plaintext, StatInfo};
