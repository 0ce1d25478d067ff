use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::Stmt;
use crate::token::Token;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum Function {
    // These are functions that the interpreter exposes to user code but that
    // are implemented in the host language. Sometimes these are called
    // primitives, external functions, or foreign functions. To add a native
    // function, the book uses anonymous class instances that implement the
    // LoxCallable interface; here a plain fn pointer does the same job.
    Native {
        arity: usize,
        body: fn(&[Object]) -> Object,
    },

    // LoxFunction in the book.
    User {
        name: Token,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Function {
    pub fn native(arity: usize, body: fn(&[Object]) -> Object) -> Self {
        Function::Native { arity, body }
    }

    pub fn user(
        name: Token,
        params: Vec<Token>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function::User { name, params, body, closure, is_initializer }
    }

    // We pass in the interpreter in case the callable implementing call()
    // needs it, plus the list of evaluated argument values; the caller's
    // job is to return the value the call expression produces.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Object]) -> Result<Object, Error> {
        match self {
            Function::Native { body, .. } => Ok(body(arguments)),
            Function::User { params, body, closure, is_initializer, .. } => {
                // Each call gets its own environment. Otherwise recursion
                // would break: multiple calls to the same function in
                // flight at once each need their own parameter bindings.
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                for (param, argument) in params.iter().zip(arguments.iter()) {
                    environment.borrow_mut().define(param.lexeme.clone(), argument.clone());
                }

                match interpreter.execute_block(body, environment) {
                    // `init` always yields the instance, whether it returns
                    // explicitly via bare `return;` or falls off the end. Any
                    // other error (a genuine runtime fault) must still
                    // propagate instead of being swallowed by that override.
                    Err(Error::Return { .. }) | Ok(()) if *is_initializer => {
                        Ok(Environment::get_at(closure, 0, "this"))
                    }
                    Err(Error::Return { value }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Object::Null),
                }
            }
        }
    }

    // Creates a new environment nestled inside the method's original
    // closure — a closure-within-a-closure. When the method is called, that
    // becomes the parent of the method body's environment, with `this`
    // bound to the instance the method was accessed from.
    pub fn bind(&self, instance: Object) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never bound"),
            Function::User { name, params, body, closure, is_initializer } => {
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                environment.borrow_mut().define("this".to_string(), instance);
                Function::User {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { params, .. } => params.len(),
        }
    }

    /// Used for `==` over callables: native functions compare by identity
    /// of their body pointer, user functions by identity of their closure
    /// (two closures over the same declaration but different captured
    /// environments are different values).
    pub fn is_same_as(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native { body: a, .. }, Function::Native { body: b, .. }) => {
                std::ptr::eq(*a as *const (), *b as *const ())
            }
            (
                Function::User { closure: a, name: n1, .. },
                Function::User { closure: b, name: n2, .. },
            ) => Rc::ptr_eq(a, b) && n1.lexeme == n2.lexeme,
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { .. } => write!(f, "<native fn>"),
            Function::User { name, .. } => write!(f, "<fn {}>", name.lexeme),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn native_arity_and_display() {
        let clock = Function::native(0, |_| Object::Number(0.0));
        assert_eq!(clock.arity(), 0);
        assert_eq!(clock.to_string(), "<native fn>");
    }

    #[test]
    fn user_function_displays_its_name() {
        let closure = Rc::new(RefCell::new(Environment::new()));
        let f = Function::user(
            Token::new(TokenType::Identifier, "greet", 1),
            vec![],
            Rc::new(vec![]),
            closure,
            false,
        );
        assert_eq!(f.to_string(), "<fn greet>");
        assert_eq!(f.arity(), 0);
    }
}
