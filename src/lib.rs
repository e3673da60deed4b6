#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod auth;
pub mod batch;
pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod logging;
pub mod publish;
pub mod sources;
pub mod storage;
pub mod transform;

mod render;
mod utils;
