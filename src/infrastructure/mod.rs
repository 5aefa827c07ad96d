pub mod actor;
pub mod config;
pub mod db;
pub mod memory;
pub mod serializer;
