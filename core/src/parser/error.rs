use pest::error::InputLocation;
use thiserror::Error;

use crate::parser::{Rule, Span};

/// Parser error with the source range it refers to.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    /// The text does not match the grammar. Carries pest's own message.
    #[error("{message}")]
    Syntax { message: String },
    #[error("integer literal `{text}` does not fit in an int")]
    LiteralOutOfRange { text: String },
    #[error("left side of `=` must be a variable")]
    InvalidAssignmentTarget,
    #[error("only assignments and method calls can be used as statements")]
    NotAStatement,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: impl Into<Span>) -> Self {
        Self {
            kind,
            span: span.into(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.location {
            InputLocation::Pos(pos) => Span::new(pos, pos),
            InputLocation::Span((start, end)) => Span::new(start, end),
        };
        let message = match &err.variant {
            pest::error::ErrorVariant::CustomError { message } => message.clone(),
            variant => variant.message().into_owned(),
        };
        ParseError::new(ParseErrorKind::Syntax { message }, span)
    }
}
