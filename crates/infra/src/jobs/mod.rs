//! Durable email job queue: storage and the enqueue/lookup service.

pub mod service;
pub mod sqlite;
pub mod store;
