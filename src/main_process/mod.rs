// Front-end process: the HTTP upload server and the supervisor of the resize host.

mod dispatch_client;
mod entrypoint;
mod startup;
mod supervisor;
mod web;

pub use entrypoint::{FrontEndConfig, run};
