use std::fmt;
use std::io;

use crate::object::Object;
use crate::token::{Token, TokenType};

/// Diagnostic sink injected through the scanner, parser, resolver and
/// interpreter. Replaces the process-global `hadError` flag the book uses
/// with a value the driver owns and can swap out (e.g. for a capturing
/// reporter in tests).
pub trait Reporter {
    fn error(&mut self, line: i32, message: &str);
    fn error_at(&mut self, token: &Token, message: &str);
    fn runtime_error(&mut self, token: &Token, message: &str);
    fn had_error(&self) -> bool;
    fn had_runtime_error(&self) -> bool;
    fn reset_static_error(&mut self);
}

/// Default reporter: formats diagnostics to stderr exactly as the reference
/// interpreter does.
#[derive(Default)]
pub struct ConsoleReporter {
    had_error: bool,
    had_runtime_error: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, line: i32, where_: &str, message: &str) {
        eprintln!("[line {line}] Error{where_}: {message}");
        self.had_error = true;
    }
}

impl Reporter for ConsoleReporter {
    fn error(&mut self, line: i32, message: &str) {
        self.report(line, "", message);
    }

    fn error_at(&mut self, token: &Token, message: &str) {
        if token.token_type == TokenType::Eof {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme), message);
        }
    }

    fn runtime_error(&mut self, token: &Token, message: &str) {
        eprintln!("{message}\n[line {}]", token.line);
        self.had_runtime_error = true;
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    fn reset_static_error(&mut self) {
        self.had_error = false;
    }
}

/// Records diagnostics instead of printing them, so tests can assert on
/// message text without scraping stderr.
#[derive(Default)]
pub struct CapturingReporter {
    pub static_errors: Vec<String>,
    pub runtime_errors: Vec<String>,
    had_error: bool,
    had_runtime_error: bool,
}

impl CapturingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for CapturingReporter {
    fn error(&mut self, line: i32, message: &str) {
        self.static_errors.push(format!("[line {line}] Error: {message}"));
        self.had_error = true;
    }

    fn error_at(&mut self, token: &Token, message: &str) {
        let where_ = if token.token_type == TokenType::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        self.static_errors
            .push(format!("[line {}] Error{where_}: {message}", token.line));
        self.had_error = true;
    }

    fn runtime_error(&mut self, token: &Token, message: &str) {
        self.runtime_errors
            .push(format!("{message}\n[line {}]", token.line));
        self.had_runtime_error = true;
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    fn reset_static_error(&mut self) {
        self.had_error = false;
    }
}

/// Reports a parser/resolver diagnostic anchored to a token, matching the
/// book's free-standing `parser_error` helper.
pub fn parser_error(reporter: &mut dyn Reporter, token: &Token, message: &str) {
    reporter.error_at(token, message);
}

#[derive(Debug)]
pub enum Error {
    /// Internal sentinel used only to unwind the parser to a synchronization
    /// point. Never observed outside `declaration()`.
    Parse,
    /// A runtime fault: carries the offending token (for its line number)
    /// and a user-facing message.
    Runtime { token: Token, message: String },
    /// Non-error control-flow carrier for `return`. Caught by
    /// `Function::call`; never reaches the top-level driver.
    Return { value: Object },
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse => write!(f, "parse error"),
            Error::Runtime { message, .. } => write!(f, "{message}"),
            Error::Return { .. } => write!(f, "return (not an error)"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
