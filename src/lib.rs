pub mod config;
pub mod db;
pub mod error;
pub mod input;
pub mod ledger;
pub mod naming;
pub mod runner;
pub mod statement;

pub use error::{Error, Result};
