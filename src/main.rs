use std::env;
use std::process::exit;

use lox_interpreter_rs::error::{ConsoleReporter, Error, Reporter};
use lox_interpreter_rs::Lox;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new();
    let mut reporter = ConsoleReporter::new();

    match &args[..] {
        [_, file_path] => match lox.run_file(file_path, &mut reporter) {
            Ok(()) => {
                if reporter.had_error() {
                    exit(65);
                }
                if reporter.had_runtime_error() {
                    exit(70);
                }
            }
            Err(Error::Io(e)) => {
                eprintln!("Couldn't read '{file_path}': {e}");
                exit(66);
            }
            Err(e) => {
                eprintln!("{e}");
                exit(70);
            }
        },
        [_] => {
            if let Err(e) = lox.run_prompt(&mut reporter) {
                eprintln!("{e}");
                exit(70);
            }
        }
        _ => {
            eprintln!("Usage: lox-interpreter-rs [script]");
            exit(64);
        }
    }
}
