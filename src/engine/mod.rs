pub mod coordinator;
pub mod lifecycle;
pub mod locks;
pub mod matcher;
pub mod queue;
