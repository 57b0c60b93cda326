//! Background delivery workers.

pub mod pool;
