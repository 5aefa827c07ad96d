pub mod change_request;
pub mod draft;
pub mod error;
pub mod fingerprint;
pub mod payload;
pub mod ports;
pub mod snapshot;
pub mod value_objects;
