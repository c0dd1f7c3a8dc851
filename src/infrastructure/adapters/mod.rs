//! Protocol client adapters

pub mod console;

pub use console::{ConsoleAdapter, ConsoleFactory};
