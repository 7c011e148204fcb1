pub mod config;
pub mod error;
pub mod types;

pub use config::{Branding, Config, TwilioCredentials};
pub use error::LeadreachError;
pub use types::*;
