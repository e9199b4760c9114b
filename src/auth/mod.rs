//! Authentication for the vision callback advertised to devices

pub mod vision_token;

pub use vision_token::{VisionClaims, VisionTokenIssuer};
