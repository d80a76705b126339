pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;
pub mod web;

pub use error::{CoreError, CoreResult};
