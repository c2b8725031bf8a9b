pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod editor;
pub mod error;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod validate;
