use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{Error, Reporter};
use crate::function::Function;
use crate::object::Object;
use crate::syntax::{expr, stmt, Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

/// Tree-walking evaluator. Holds the global scope, the environment currently
/// in effect, and the resolver's distance side table (keyed by `Expr::id()`
/// rather than token identity, so clones and moves of the tree don't break
/// it).
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<u64, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Same as `new`, but `print` statements write to `output` instead of
    /// stdout. Lets tests and the `run_to_string` helper capture program
    /// output without touching the real process streams.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Object::Callable(Function::native(0, |_| {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                Object::Number(secs)
            })),
        );

        Self { environment: Rc::clone(&globals), globals, locals: HashMap::new(), output }
    }

    /// Called by the resolver once per variable reference it resolves to a
    /// local scope. `id` is the referencing expression's node id, `depth`
    /// the number of enclosing scopes to walk at lookup time.
    pub fn resolve(&mut self, id: u64, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut dyn Reporter) {
        for statement in statements {
            if let Err(e) = self.execute(statement) {
                match e {
                    Error::Runtime { token, message } => reporter.runtime_error(&token, &message),
                    other => log::error!("interpreter aborted: {other}"),
                }
                return;
            }
        }
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    /// Runs `statements` in a fresh child of `environment`, restoring the
    /// previous environment afterwards even if execution returns early via
    /// an error or a `return`.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Rc<RefCell<Environment>>) -> Result<(), Error> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = (|| {
            for statement in statements {
                self.execute(statement)?;
            }
            Ok(())
        })();

        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Object, Error> {
        expr.accept(self)
    }

    fn lookup_variable(&mut self, id: u64, name: &Token) -> Result<Object, Error> {
        if let Some(&distance) = self.locals.get(&id) {
            Ok(Environment::get_at(&self.environment, distance, &name.lexeme))
        } else {
            self.globals.borrow().get(name)
        }
    }

    fn number_operand_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(Error::Runtime { token: operator.clone(), message: "Operand must be a number.".to_string() })
    }

    fn number_operands_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(Error::Runtime { token: operator.clone(), message: "Operands must be numbers.".to_string() })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl expr::Visitor<Result<Object, Error>> for Interpreter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, Error> {
        Ok(match value {
            LiteralValue::Boolean(b) => Object::Boolean(*b),
            LiteralValue::Null => Object::Null,
            LiteralValue::Number(n) => Object::Number(*n),
            LiteralValue::String(s) => Object::String(s.clone()),
        })
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, Error> {
        self.evaluate(expression)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match right {
                Object::Number(n) => Ok(Object::Number(-n)),
                _ => self.number_operand_error(operator),
            },
            TokenType::Bang => Ok(Object::Boolean(!right.is_truthy())),
            _ => unreachable!("scanner/parser never produce other unary operators"),
        }
    }

    fn visit_binary_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let l = self.evaluate(left)?;
        let r = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a - b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Slash => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a / b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Star => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a * b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Plus => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Number(a + b)),
                (Object::String(a), Object::String(b)) => Ok(Object::String(a + &b)),
                _ => Err(Error::Runtime {
                    token: operator.clone(),
                    message: "Operands must be two numbers or two strings.".to_string(),
                }),
            },
            TokenType::GreaterEqual => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a >= b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Greater => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a > b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::LessEqual => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a <= b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Less => match (l, r) {
                (Object::Number(a), Object::Number(b)) => Ok(Object::Boolean(a < b)),
                _ => self.number_operands_error(operator),
            },
            TokenType::BangEqual => Ok(Object::Boolean(!l.equals(&r))),
            TokenType::EqualEqual => Ok(Object::Boolean(l.equals(&r))),
            _ => unreachable!("scanner/parser never produce other binary operators"),
        }
    }

    fn visit_logical_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let left = self.evaluate(left)?;

        // Short-circuit: `or` returns the left operand if it's truthy,
        // `and` returns it if it's falsy — in both cases without evaluating
        // the right side.
        if operator.token_type == TokenType::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_variable_expr(&mut self, id: u64, name: &Token) -> Result<Object, Error> {
        self.lookup_variable(id, name)
    }

    fn visit_assign_expr(&mut self, id: u64, name: &Token, value: &Expr) -> Result<Object, Error> {
        let value = self.evaluate(value)?;

        if let Some(&distance) = self.locals.get(&id) {
            Environment::assign_at(&self.environment, distance, name, value.clone());
        } else {
            self.globals.borrow_mut().assign(name, value.clone())?;
        }

        Ok(value)
    }

    fn visit_call_expr(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Object, Error> {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        let arity = match &callee {
            Object::Callable(f) => f.arity(),
            Object::Class(class) => class.borrow().arity(),
            _ => {
                return Err(Error::Runtime {
                    token: paren.clone(),
                    message: "Can only call functions and classes.".to_string(),
                })
            }
        };

        if args.len() != arity {
            return Err(Error::Runtime {
                token: paren.clone(),
                message: format!("Expected {arity} arguments but got {}.", args.len()),
            });
        }

        match callee {
            Object::Class(class) => {
                let instance = LoxInstance::new(&class);
                if let Some(initializer) = class.borrow().find_method("init") {
                    initializer.bind(instance.clone()).call(self, &args)?;
                }
                Ok(instance)
            }
            Object::Callable(f) => f.call(self, &args),
            _ => unreachable!("checked above"),
        }
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        match &object {
            Object::Instance(instance) => instance.borrow().get(name, &object),
            _ => Err(Error::Runtime { token: name.clone(), message: "Only instances have properties.".to_string() }),
        }
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Object, Error> {
        let object = self.evaluate(object)?;

        let Object::Instance(instance) = &object else {
            return Err(Error::Runtime { token: name.clone(), message: "Only instances have fields.".to_string() });
        };

        let value = self.evaluate(value)?;
        instance.borrow_mut().set(name, value.clone());
        Ok(value)
    }

    fn visit_this_expr(&mut self, id: u64, keyword: &Token) -> Result<Object, Error> {
        self.lookup_variable(id, keyword)
    }

    fn visit_super_expr(&mut self, id: u64, keyword: &Token, method: &Token) -> Result<Object, Error> {
        let distance = *self.locals.get(&id).expect("resolver always resolves 'super'");
        let superclass = Environment::get_at(&self.environment, distance, "super");
        let Object::Class(superclass) = superclass else {
            unreachable!("'super' always binds to a class")
        };

        // `this` is always one scope nearer than `super`: the environment
        // chain is ... -> super-scope -> this-scope -> method body.
        let instance = Environment::get_at(&self.environment, distance - 1, "this");

        let Some(found) = superclass.borrow().find_method(&method.lexeme) else {
            return Err(Error::Runtime {
                token: method.clone(),
                message: format!("Undefined property '{}'.", method.lexeme),
            });
        };

        Ok(Object::Callable(found.bind(instance)))
    }
}

impl stmt::Visitor<Result<(), Error>> for Interpreter {
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        writeln!(self.output, "{value}")?;
        Ok(())
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Null,
        };
        self.environment.borrow_mut().define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let scope = Rc::new(RefCell::new(Environment::from(&self.environment)));
        self.execute_block(statements, scope)
    }

    fn visit_if_stmt(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: &Option<Box<Stmt>>) -> Result<(), Error> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        while self.evaluate(condition)?.is_truthy() {
            self.execute(body)?;
        }
        Ok(())
    }

    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        let function = Function::user(
            name.clone(),
            params.to_vec(),
            Rc::new(body.to_vec()),
            Rc::clone(&self.environment),
            false,
        );
        self.environment.borrow_mut().define(name.lexeme.clone(), Object::Callable(function));
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Null,
        };
        Err(Error::Return { value })
    }

    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) -> Result<(), Error> {
        let superclass = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Object::Class(class) => Some(class),
                    _ => {
                        let Expr::Variable { name: super_name, .. } = expr else {
                            unreachable!("the parser only ever produces a Variable for a superclass clause")
                        };
                        return Err(Error::Runtime {
                            token: super_name.clone(),
                            message: "Superclass must be a class.".to_string(),
                        });
                    }
                }
            }
            None => None,
        };

        self.environment.borrow_mut().define(name.lexeme.clone(), Object::Null);

        // If there's a superclass, method bodies are evaluated in a scope
        // that binds `super` to it, one level outside the class's own
        // environment.
        let previous = if superclass.is_some() {
            let enclosing = Rc::clone(&self.environment);
            let scope = Rc::new(RefCell::new(Environment::from(&enclosing)));
            scope.borrow_mut().define("super".to_string(), Object::Class(superclass.clone().unwrap()));
            Some(std::mem::replace(&mut self.environment, scope))
        } else {
            None
        };

        let mut class_methods = HashMap::new();
        for method in methods {
            if let Stmt::Function { name: method_name, params, body } = method {
                let is_initializer = method_name.lexeme == "init";
                let function = Function::user(
                    method_name.clone(),
                    params.to_vec(),
                    Rc::new(body.to_vec()),
                    Rc::clone(&self.environment),
                    is_initializer,
                );
                class_methods.insert(method_name.lexeme.clone(), function);
            }
        }

        let class = Rc::new(RefCell::new(LoxClass::new(name.lexeme.clone(), superclass, class_methods)));

        if let Some(previous) = previous {
            self.environment = previous;
        }

        self.environment.borrow_mut().assign(name, Object::Class(class))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapturingReporter;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> CapturingReporter {
        let mut reporter = CapturingReporter::new();
        let tokens = {
            let mut scanner = Scanner::new(source.to_string(), &mut reporter);
            scanner.scan_tokens().clone()
        };
        let stmts = {
            let mut parser = Parser::new(&tokens, &mut reporter);
            parser.parse().expect("parse should succeed")
        };
        let mut interpreter = Interpreter::new();
        {
            let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
            resolver.resolve_stmts(&stmts);
        }
        interpreter.interpret(&stmts, &mut reporter);
        reporter
    }

    #[test]
    fn arithmetic_and_string_concat() {
        let reporter = run("print 1 + 2 * 3; print \"a\" + \"b\";");
        assert!(!reporter.had_error());
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn adding_number_and_string_is_a_runtime_error() {
        let reporter = run("print 1 + \"a\";");
        assert!(reporter.had_runtime_error());
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let reporter = run(
            "fun makeCounter() { var i = 0; fun count() { i = i + 1; return i; } return count; } \
             var counter = makeCounter(); print counter(); print counter();",
        );
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn class_instantiation_and_method_dispatch() {
        let reporter = run(
            "class Greeter { init(name) { this.name = name; } greet() { return \"hi \" + this.name; } } \
             var g = Greeter(\"Ada\"); print g.greet();",
        );
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn superclass_method_dispatch_via_super() {
        let reporter = run(
            "class A { speak() { return \"a\"; } } \
             class B < A { speak() { return super.speak() + \"b\"; } } \
             print B().speak();",
        );
        assert!(!reporter.had_runtime_error());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let reporter = run("print nope;");
        assert!(reporter.had_runtime_error());
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let reporter = run("var x = 1; x();");
        assert!(reporter.had_runtime_error());
    }

    #[test]
    fn a_runtime_error_inside_init_propagates_instead_of_being_swallowed() {
        let reporter = run("class C { init() { this.x = \"a\" - 1; } } C();");
        assert!(reporter.had_runtime_error());
    }
}
