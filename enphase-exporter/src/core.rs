pub mod local_time;
pub mod poller;
pub mod snapshot;
