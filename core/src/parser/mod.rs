pub mod error;
#[allow(clippy::module_inception)]
pub mod parser;
mod syntax;

pub use error::{ParseError, ParseErrorKind};
pub use parser::{DuckParser, Rule, parse, parse_expr};
pub use syntax::Span;
