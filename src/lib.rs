pub mod clock;
pub mod compactor;
pub mod config;
pub mod durable;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod projection;
pub mod publisher;
pub mod store;
pub mod transport;
pub mod wal;
