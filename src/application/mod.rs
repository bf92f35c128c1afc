//! Application services: text processing and render publication.

pub mod error;
pub mod local;
pub mod processor;
pub mod service;
