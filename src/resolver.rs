use crate::error::{parser_error, Reporter};
use crate::interpreter::Interpreter;
use crate::syntax::{expr, stmt, Expr, LiteralValue, Stmt};
use crate::token::Token;

use std::collections::HashMap;
use std::mem;

// Much like we track scopes as we walk the tree, we track whether the code
// we're currently visiting is inside a function declaration, and which kind
// — this is what lets `return` outside a function and a value-`return`
// inside an initializer be flagged as errors.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'i, 'r> {
    interpreter: &'i mut Interpreter,
    reporter: &'r mut dyn Reporter,

    // Only local block scopes live here. Variables declared at the top
    // level are not tracked since they're more dynamic in Lox — if
    // resolve_local walks the whole stack and finds nothing, the variable
    // is assumed global and left for the interpreter to look up at runtime.
    scopes: Vec<HashMap<String, bool>>,

    current_function: FunctionType,
    current_class: ClassType,
}

impl<'i, 'r> Resolver<'i, 'r> {
    pub fn new(interpreter: &'i mut Interpreter, reporter: &'r mut dyn Reporter) -> Self {
        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        statement.accept(self);
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement)
        }
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        expression.accept(self);
    }

    // Lexical scopes nest in both the interpreter and the resolver; the
    // interpreter's stack is the Environment parent-pointer chain, the
    // resolver's is this Vec.
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Adds the variable to the innermost scope, bound to `false` to mark it
    // "declared but not yet defined" — this is what catches `var a = a;`.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                parser_error(self.reporter, name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    // Once the initializer has been resolved, the variable is ready.
    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // Walks outward from the innermost scope; if found at index `i`, the
    // variable is `i` hops away from the scope currently being resolved. If
    // it isn't found anywhere in the stack, it's left unresolved and treated
    // as global.
    fn resolve_local(&mut self, id: u64, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, i);
                return;
            }
        }
    }

    // Binds each parameter in a fresh scope and resolves the body inside it.
    // Unlike the interpreter, which only touches a function's body when it's
    // called, the resolver walks into it immediately.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], tpe: FunctionType) {
        let enclosing_function = mem::replace(&mut self.current_function, tpe);
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }
}

// Only a few kinds of nodes matter for variable resolution: a block
// introduces a scope, a function declaration introduces a scope for its
// body and binds its parameters, a var declaration adds a binding to the
// current scope, and variable/assignment expressions need their variable
// resolved. Everything else just recurses into its subexpressions.

impl<'i, 'r> expr::Visitor<()> for Resolver<'i, 'r> {
    fn visit_literal_expr(&mut self, _value: &LiteralValue) {}

    fn visit_grouping_expr(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_unary_expr(&mut self, _operator: &Token, right: &Expr) {
        self.resolve_expr(right);
    }

    fn visit_binary_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    // No control flow or short-circuiting happens during static analysis, so
    // logical expressions resolve exactly like any other binary operator.
    fn visit_logical_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) {
        self.resolve_expr(left);
        self.resolve_expr(right);
    }

    fn visit_variable_expr(&mut self, id: u64, name: &Token) {
        if let Some(scope) = self.scopes.last() {
            if scope.get(&name.lexeme).copied() == Some(false) {
                parser_error(self.reporter, name, "Can't read local variable in its own initializer.");
            }
        }
        self.resolve_local(id, name);
    }

    fn visit_assign_expr(&mut self, id: u64, name: &Token, value: &Expr) {
        self.resolve_expr(value);
        self.resolve_local(id, name);
    }

    fn visit_call_expr(&mut self, callee: &Expr, _paren: &Token, arguments: &[Expr]) {
        self.resolve_expr(callee);
        for argument in arguments {
            self.resolve_expr(argument);
        }
    }

    // Only the object expression is resolved; the property name is looked up
    // dynamically at runtime, so there's nothing static to do with it.
    fn visit_get_expr(&mut self, object: &Expr, _name: &Token) {
        self.resolve_expr(object);
    }

    fn visit_set_expr(&mut self, object: &Expr, _name: &Token, value: &Expr) {
        self.resolve_expr(value);
        self.resolve_expr(object);
    }

    fn visit_this_expr(&mut self, id: u64, keyword: &Token) {
        if self.current_class == ClassType::None {
            parser_error(self.reporter, keyword, "Can't use 'this' outside of a class.");
            return;
        }
        self.resolve_local(id, keyword);
    }

    fn visit_super_expr(&mut self, id: u64, keyword: &Token, _method: &Token) {
        match self.current_class {
            ClassType::None => {
                parser_error(self.reporter, keyword, "Can't use 'super' outside of a class.");
            }
            ClassType::Class => {
                parser_error(self.reporter, keyword, "Can't use 'super' in a class with no superclass.");
            }
            ClassType::Subclass => self.resolve_local(id, keyword),
        }
    }
}

impl<'i, 'r> stmt::Visitor<()> for Resolver<'i, 'r> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) {
        self.begin_scope();
        self.resolve_stmts(statements);
        self.end_scope();
    }

    // Whenever `this` is encountered inside a method, it resolves as a local
    // variable in an implicit scope wrapped just outside the method body;
    // `super`, when there's a superclass, gets its own scope outside that.
    fn visit_class_stmt(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[Stmt]) {
        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                parser_error(self.reporter, super_name, "A class can't inherit from itself.");
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass.as_ref().unwrap());

            self.begin_scope();
            self.scopes.last_mut().expect("scope just pushed").insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().expect("scope just pushed").insert("this".to_string(), true);

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let declaration = if name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };
                self.resolve_function(params, body, declaration);
            } else {
                unreachable!("class body only contains Stmt::Function nodes");
            }
        }
        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_if_stmt(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: &Option<Box<Stmt>>) {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(else_stmt) = else_branch {
            self.resolve_stmt(else_stmt);
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) {
        self.resolve_expr(expression);
    }

    fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>) {
        if self.current_function == FunctionType::None {
            parser_error(self.reporter, keyword, "Can't return from top-level code.");
        }

        if let Some(return_value) = value {
            if self.current_function == FunctionType::Initializer {
                parser_error(self.reporter, keyword, "Can't return a value from an initializer.");
            }
            self.resolve_expr(return_value);
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
    }

    // Binding is split into declare then define to handle shadowing oddities
    // like `var a = "outer"; { var a = a; }` — the inner `a`'s initializer
    // must not see the inner `a` itself.
    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) {
        self.declare(name);
        if let Some(init) = initializer {
            self.resolve_expr(init);
        }
        self.define(name);
    }

    // The function's own name is declared and defined eagerly, before its
    // body is resolved, so the body can refer back to the function itself.
    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) {
        self.declare(name);
        self.define(name);

        self.resolve_function(params, body, FunctionType::Function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapturingReporter;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> CapturingReporter {
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
        let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
        resolver.resolve_stmts(&stmts);
        reporter
    }

    #[test]
    fn self_referential_initializer_is_an_error() {
        let reporter = resolve("var a = \"outer\"; { var a = a; }");
        assert!(reporter.had_error());
    }

    #[test]
    fn return_at_top_level_is_an_error() {
        let reporter = resolve("return 1;");
        assert!(reporter.had_error());
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        let reporter = resolve("print this;");
        assert!(reporter.had_error());
    }

    #[test]
    fn class_inheriting_from_itself_is_an_error() {
        let reporter = resolve("class Oops < Oops {}");
        assert!(reporter.had_error());
    }

    #[test]
    fn returning_a_value_from_init_is_an_error() {
        let reporter = resolve("class C { init() { return 1; } }");
        assert!(reporter.had_error());
    }

    #[test]
    fn well_formed_program_resolves_cleanly() {
        let reporter = resolve(
            "class Animal { speak() { return this.sound; } } \
             class Dog < Animal { init() { this.sound = \"woof\"; } } \
             var d = Dog(); print d.speak();",
        );
        assert!(!reporter.had_error());
    }
}
