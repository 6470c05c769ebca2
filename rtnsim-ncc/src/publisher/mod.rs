//! TBTP publisher: serialization, deadline enforcement and broadcast.

mod task;

pub use task::PublisherTask;
