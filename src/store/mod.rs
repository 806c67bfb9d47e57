mod document;
mod errors;

pub use document::{BackendMode, DocumentStore};
pub use errors::StoreError;
