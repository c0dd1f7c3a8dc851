//! Message handling - Command parsing, permission gating and routing

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{CommandDispatcher, Handler, HandlerFuture, HandlerResult, Route};
pub use parser::{parse_command_line, CommandLine};
