//! Database layer: connection pool, schema, and storage engine

pub mod pool;
pub mod schema;
pub mod store;

pub use pool::{ConnectionPool, PooledConnection};
pub use store::Store;
