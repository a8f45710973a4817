#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatch;
pub(crate) mod errors;
pub mod gateway;
pub mod lang;
pub mod llm;
pub mod notify;
pub mod orchestrator;
pub mod order;
pub mod prompt;
pub mod reply;
pub mod session;
pub mod store;
pub mod transcript;
pub(crate) mod utils;

pub use errors::AurabotError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
