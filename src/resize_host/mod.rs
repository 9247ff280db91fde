// Resize host: the backend process that performs resizes for the front end.
// Started by the front end's supervisor as `<exe> --mode=backend`.

mod entrypoint;
pub mod listener;
pub mod worker_pool;

pub use entrypoint::{ResizeHostConfig, run};
