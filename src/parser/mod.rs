mod api;
pub mod ast;
pub mod printer;
mod static_semantics;
pub mod util;

pub use api::{HiseParser, ParseError, Rule};
