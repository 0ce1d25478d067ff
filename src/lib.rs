pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod object;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod syntax;
pub mod token;

use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use error::{CapturingReporter, Error, Reporter};
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Owns the interpreter's persistent state (globals, environment) across
/// however many `run` calls the driver makes — one for a script file, one
/// per line in the REPL.
pub struct Lox {
    interpreter: Interpreter,
}

impl Lox {
    pub fn new() -> Self {
        Self { interpreter: Interpreter::new() }
    }

    /// Same as `new`, but `print` statements write to `output` rather than
    /// stdout. Used by `run_to_string` to capture a program's output.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self { interpreter: Interpreter::with_output(output) }
    }

    pub fn run_file(&mut self, path: &str, reporter: &mut dyn Reporter) -> Result<(), Error> {
        let source = fs::read_to_string(path)?;
        self.run(source, reporter);
        Ok(())
    }

    /// Runs the REPL on stdin/stdout. Each line clears the static-error flag
    /// (so one bad line doesn't poison the next) but not the runtime-error
    /// flag (the caller decides what to do about a prior runtime failure).
    pub fn run_prompt(&mut self, reporter: &mut dyn Reporter) -> Result<(), Error> {
        let stdin = io::stdin();
        print!("> ");
        io::stdout().flush()?;

        for line in stdin.lock().lines() {
            self.run(line?, reporter);
            reporter.reset_static_error();
            print!("> ");
            io::stdout().flush()?;
        }

        Ok(())
    }

    pub fn run(&mut self, source: String, reporter: &mut dyn Reporter) {
        log::debug!("scanning {} bytes of source", source.len());
        let tokens = {
            let mut scanner = Scanner::new(source, reporter);
            scanner.scan_tokens().clone()
        };

        log::debug!("parsing {} tokens", tokens.len());
        let statements = {
            let mut parser = Parser::new(&tokens, reporter);
            match parser.parse() {
                Ok(statements) => statements,
                Err(_) => return,
            }
        };

        if reporter.had_error() {
            return;
        }

        // The resolver pokes its distance side table directly into the
        // interpreter as it walks the tree; by the time it's done the
        // interpreter has everything it needs to evaluate variable and
        // `this`/`super` references without re-walking scopes at runtime.
        log::debug!("resolving {} top-level statements", statements.len());
        {
            let mut resolver = Resolver::new(&mut self.interpreter, reporter);
            resolver.resolve_stmts(&statements);
        }

        if reporter.had_error() {
            return;
        }

        log::debug!("interpreting");
        self.interpreter.interpret(&statements, reporter);
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

/// An `io::Write` sink backed by a reference-counted buffer, so the caller
/// can hand one end to the interpreter and read back what it wrote from the
/// other.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs a complete program against a fresh interpreter and returns its
/// captured stdout, its captured diagnostics (errors Lox would otherwise
/// print to stderr), and the process exit code the CLI would have used.
///
/// Each call gets its own `Lox`, matching how the CLI starts fresh for every
/// script.
pub fn run_to_string(source: &str) -> (String, String, i32) {
    let stdout = SharedBuffer::default();
    let mut reporter = CapturingReporter::new();
    Lox::with_output(Box::new(stdout.clone())).run(source.to_string(), &mut reporter);

    let out = String::from_utf8_lossy(&stdout.0.borrow()).into_owned();
    let diagnostics: String = reporter
        .static_errors
        .iter()
        .chain(reporter.runtime_errors.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let code = if reporter.had_error() {
        65
    } else if reporter.had_runtime_error() {
        70
    } else {
        0
    };

    (out, diagnostics, code)
}
