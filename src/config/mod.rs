pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{load_settings, parse_settings, ConfigFormat};
pub use types::*;
pub use validation::{validate_settings, ValidationError};
