//! Host infrastructure: command line/env configuration, console logging and
//! loading of the provider configuration document.

pub mod config;
pub mod logging;
pub mod providers;
