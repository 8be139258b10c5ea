// src/lib.rs — Library root for research-stream

pub mod cli;
pub mod infra;
pub mod session;
pub mod stream;
