#[macro_use]
extern crate log;

pub mod api;
pub mod cli;
pub mod daemon;
pub mod daemon_status;
pub mod detect;
pub mod discovery;
pub mod env;
pub mod error;
pub mod home;
pub mod logger;
pub mod port;
pub mod procs;
pub mod settings;
pub mod supervisor;
pub mod verify;

#[cfg(test)]
mod test_helpers;

pub use miette::Result;
