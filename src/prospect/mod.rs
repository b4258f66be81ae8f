//! Prospect input: file loading and row validation.

mod loader;
mod record;

pub use loader::{load_prospects, read_prospects};
pub use record::{is_valid_email, validate, ProspectRecord, RawProspect};
