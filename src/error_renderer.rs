//! Error rendering using ariadne
//!
//! Parse errors carry a span and are drawn against the source. Class and
//! method errors are reported one per line.

use crate::Error;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::io::Write;

/// Render an error with formatting to stderr
pub fn render_error(error: &Error, source: &str) {
    render_error_to_writer(error, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, source: &str, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, source, writer, true)
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Parse(err) => {
            // Widen a zero-width span to one character where the source allows.
            let mut span = err.span().0.clone();
            if span.is_empty() {
                span.end = (span.start + 1).min(source.len()).max(span.start);
            }
            let message = err.to_string();

            Report::build(ReportKind::Error, ("<source>", span.clone()))
                .with_message(&message)
                .with_config(ariadne::Config::default().with_color(use_color))
                .with_label(
                    Label::new(("<source>", span))
                        .with_message(&message)
                        .with_color(Color::Red),
                )
                .finish()
                .write(("<source>", Source::from(source)), &mut *writer)
        }
        Error::Class(err) => writeln!(writer, "Error: {}", err),
        Error::Compile(errors) => {
            for err in errors {
                writeln!(writer, "Error: {}", err)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_source;

    #[test]
    fn test_render_parse_error() {
        let source = "class A { int f() { return 1 + ; } }";
        let err = compile_source(source).unwrap_err();
        let output = render_error_to_string_no_color(&err, source);

        assert!(output.contains("Error"));
        assert!(output.contains("return 1 + ;"));
    }

    #[test]
    fn test_render_compile_errors() {
        let source = "class A { int f() { return x; } int g() { } }";
        let err = compile_source(source).unwrap_err();
        let output = render_error_to_string_no_color(&err, source);

        assert_eq!(
            output,
            "Error: in method `f`: cannot find `x` in this scope\n\
             Error: in method `g`: missing return statement\n"
        );
    }

    #[test]
    fn test_render_error_at_end_of_input() {
        let source = "class A {";
        let err = compile_source(source).unwrap_err();
        let output = render_error_to_string_no_color(&err, source);
        assert!(output.contains("Error"));
    }
}
