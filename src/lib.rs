pub mod ask;
pub mod challenge;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod render;
pub mod session;
pub mod summarize;
pub mod util;
