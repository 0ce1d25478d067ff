use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{error::Error, object::Object, token::Token};

/// A mapping from identifier name to value plus an optional link to an
/// enclosing environment. The `global` environment sits at the root; each
/// function call body and each block introduces a fresh child.
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>, // Parent-pointer
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn from(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    pub fn define(&mut self, name: String, value: Object) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Object, Error> {
        let key = &*name.lexeme;
        if let Some(value) = self.values.get(key) {
            Ok((*value).clone())
        } else if let Some(ref enclosing) = self.enclosing {
            // it is probably faster to iteratively walk the chain but recursion here is prettier
            enclosing.borrow().get(name)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), Error> {
        let key = &*name.lexeme;
        if self.values.contains_key(key) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{}'.", key),
            })
        }
    }

    /// Follows `enclosing` exactly `distance` times. The resolver guarantees
    /// the ancestor exists for every distance it records, so a missing link
    /// here is a resolver/interpreter bug rather than a user-facing error.
    fn ancestor(this: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut env = Rc::clone(this);
        for _ in 0..distance {
            let next = env
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolver distance exceeds environment chain length")
                .clone();
            env = next;
        }
        env
    }

    pub fn get_at(this: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Object {
        Environment::ancestor(this, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("resolver promised this binding exists")
    }

    pub fn assign_at(this: &Rc<RefCell<Environment>>, distance: usize, name: &Token, value: Object) {
        Environment::ancestor(this, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme.clone(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn tok(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, 1)
    }

    #[test]
    fn shadowing_and_ancestor_hop() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a".to_string(), Object::Number(1.0));

        let child = Rc::new(RefCell::new(Environment::from(&global)));
        child.borrow_mut().define("a".to_string(), Object::Number(2.0));

        assert_eq!(Environment::get_at(&child, 0, "a").to_string(), "2");
        assert_eq!(Environment::get_at(&child, 1, "a").to_string(), "1");
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let global = Rc::new(RefCell::new(Environment::new()));
        let err = global.borrow().get(&tok("missing")).unwrap_err();
        match err {
            Error::Runtime { message, .. } => assert_eq!(message, "Undefined variable 'missing'."),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn assign_walks_up_to_enclosing_scope() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a".to_string(), Object::Number(1.0));
        let child = Rc::new(RefCell::new(Environment::from(&global)));

        child.borrow_mut().assign(&tok("a"), Object::Number(9.0)).unwrap();

        assert_eq!(global.borrow().get(&tok("a")).unwrap().to_string(), "9");
    }
}
