//! Agent run inputs: text fields, file uploads and their wire encoding.

pub mod file;
pub mod inputs;
pub mod sniff;

pub use file::{FilePart, FileUpload, UploadReader};
pub use inputs::{DynamicInputs, EncodedInputs, InputValue};
