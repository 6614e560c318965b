//! Durable task queue: at-least-once transport of job descriptors
//! between the producer and the workers, partitioned by action type
//! into distinct named channels.

pub mod channel;
pub mod descriptor;

pub use channel::{SqliteChannel, TaskChannel, POLL_INTERVAL, RECONNECT_DELAY};
pub use descriptor::{ActionType, JobDescriptor};
