use crate::error::{parser_error, Error, Reporter};
use crate::syntax::{next_id, Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

pub struct Parser<'t, 'r> {
    tokens: &'t [Token],
    current: usize,
    reporter: &'r mut dyn Reporter,
}

macro_rules! matches {
    ( $sel:ident, $( $x:expr ),* ) => {
        {
            if $( $sel.check($x) )||* {
                $sel.advance();
                true
            } else {
                false
            }
        }
    };
}

impl<'t, 'r> Parser<'t, 'r> {
    pub fn new(tokens: &'t [Token], reporter: &'r mut dyn Reporter) -> Self {
        Self { tokens, current: 0, reporter }
    }

    // program        → declaration* EOF ;
    pub fn parse(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration()? {
                statements.push(stmt);
            }
        }
        Ok(statements)
    }

    // declaration    → classDecl | funDecl | varDecl | statement ;
    //
    // Returns `None` when the declaration was malformed and the parser had to
    // synchronize; the caller drops it from the statement list instead of
    // threading a null-object placeholder through the tree.
    fn declaration(&mut self) -> Result<Option<Stmt>, Error> {
        let statement = if matches!(self, TokenType::Var) {
            self.var_declaration()
        } else if matches!(self, TokenType::Class) {
            self.class_declaration()
        } else if matches!(self, TokenType::Fun) {
            self.function("function")
        } else {
            self.statement()
        };

        match statement {
            Err(Error::Parse) => {
                self.synchronize();
                Ok(None)
            }
            Ok(stmt) => Ok(Some(stmt)),
            Err(other) => Err(other),
        }
    }

    // classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
    fn class_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if matches!(self, TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(self.previous().clone())
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods: Vec<Stmt> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass: superclass.map(|name| Expr::Variable { id: next_id(), name }),
            methods,
        })
    }

    // Like most dynamically typed languages, fields are not explicitly listed
    // in the class declaration. Instances are loose bags of data you can
    // freely add fields to from ordinary code.

    // funDecl        → "fun" function ;
    // function       → IDENTIFIER "(" parameters? ")" block ;
    // parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
    fn function(&mut self, kind: &str) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;

        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params: Vec<Token> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 parameters.");
                }

                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);

                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(Stmt::Function { name, params, body })
    }

    // statement      → exprStmt | printStmt | ifStmt | block | returnStmt | whileStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, Error> {
        if matches!(self, TokenType::For) {
            self.for_statement()
        } else if matches!(self, TokenType::If) {
            self.if_statement()
        } else if matches!(self, TokenType::Print) {
            self.print_statement()
        } else if matches!(self, TokenType::Return) {
            self.return_statement()
        } else if matches!(self, TokenType::While) {
            self.while_statement()
        } else if matches!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    // In Lox the body of a function is a list of statements, none of which
    // produce a value, so `return` needs its own dedicated syntax.
    // returnStmt     → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // the else is bound to the nearest if that precedes it
    // ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
    fn if_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if matches!(self, TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    // block          → "{" declaration* "}" ;
    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration()? {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // whileStmt      → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::While { condition, body: Box::new(body) })
    }

    // forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
    // Desugars straight into a while loop; there is no dedicated `for` node.
    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches!(self, TokenType::Semicolon) {
            None
        } else if matches!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(incr) = increment {
            body = Stmt::Block { statements: vec![body, Stmt::Expression { expression: incr }] };
        }

        body = Stmt::While {
            condition: condition
                .unwrap_or(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(true) }),
            body: Box::new(body),
        };

        if let Some(init) = initializer {
            body = Stmt::Block { statements: vec![init, body] };
        }

        Ok(body)
    }

    // varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if matches!(self, TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // expression     → assignment ;
    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    // The parser first parses the left side as an ordinary expression, then
    // reinterprets it as an assignment target once it sees the `=`, since
    // every valid assignment target also happens to be valid expression
    // syntax on its own.
    //
    // assignment     → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    fn assignment(&mut self) -> Result<Expr, Error> {
        let expr = self.logic_or()?;

        if matches!(self, TokenType::Equal) {
            // Assignment is right-associative, so we recurse into
            // assignment() for the right-hand side instead of looping.
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign { id: next_id(), name, value }),
                Expr::Get { object, name, .. } => {
                    Ok(Expr::Set { id: next_id(), object, name, value })
                }
                _ => {
                    // Not thrown: the parser isn't in a confused state here,
                    // it just found an expression that can't be a target.
                    let equals = self.previous().clone();
                    self.error(&equals, "Invalid assignment target.");
                    Ok(*value)
                }
            };
        }

        Ok(expr)
    }

    // logic_or       → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logic_and()?;

        while matches!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    // logic_and      → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;

        while matches!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    // equality       → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;

        while matches!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;

        while matches!(
            self,
            TokenType::GreaterEqual,
            TokenType::Greater,
            TokenType::LessEqual,
            TokenType::Less
        ) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    // term           → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;

        while matches!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }
        Ok(expr)
    }

    // factor         → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;

        while matches!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary { id: next_id(), left: Box::new(expr), operator, right: Box::new(right) };
        }

        Ok(expr)
    }

    // unary          → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary { id: next_id(), operator, right: Box::new(right) });
        }

        self.call()
    }

    // call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    // Matches a primary expression followed by zero or more calls or property
    // accesses chained off it.
    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get { id: next_id(), object: Box::new(expr), name };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // arguments      → expression ( "," expression )* ;
    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut arguments: Vec<Expr> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Only reported, not thrown: the parser is still in a
                    // perfectly valid state, it just saw too many arguments.
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call { id: next_id(), callee: Box::new(callee), paren, arguments })
    }

    // primary        → NUMBER | STRING | "true" | "false" | "nil" | "(" expression ")"
    //                | IDENTIFIER | "this" | "super" "." IDENTIFIER ;
    fn primary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::False) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(false) });
        }
        if matches!(self, TokenType::True) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Boolean(true) });
        }
        if matches!(self, TokenType::Nil) {
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Null });
        }

        if let TokenType::Number { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::Number(literal) });
        }
        if let TokenType::String { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(Expr::Literal { id: next_id(), value: LiteralValue::String(literal) });
        }

        if matches!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super { id: next_id(), keyword, method });
        }
        if matches!(self, TokenType::This) {
            return Ok(Expr::This { id: next_id(), keyword: self.previous().clone() });
        }
        if matches!(self, TokenType::Identifier) {
            return Ok(Expr::Variable { id: next_id(), name: self.previous().clone() });
        }
        if matches!(self, TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping { id: next_id(), expression: Box::new(expr) });
        }

        let token = self.peek().clone();
        Err(self.error(&token, "Expect expression."))
    }

    // printStmt      → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression: value })
    }

    // exprStmt       → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression: value })
    }

    // Discards tokens until we're plausibly at the start of the next
    // statement, so one syntax error doesn't cascade into a wall of bogus
    // follow-on errors.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {
                    self.advance();
                }
            };
        }
    }

    // returns true if the current token is of the given type; unlike
    // advance() it never consumes the token, it only peeks at it.
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).expect("peek past end of token stream")
    }

    fn previous(&self) -> &Token {
        self.tokens.get(self.current - 1).expect("previous on an empty stream")
    }

    fn consume(&mut self, token_type: TokenType, msg: &str) -> Result<Token, Error> {
        if self.check(token_type) {
            Ok(self.advance().clone())
        } else {
            let token = self.peek().clone();
            Err(self.error(&token, msg))
        }
    }

    fn error(&mut self, token: &Token, msg: &str) -> Error {
        parser_error(self.reporter, token, msg);
        Error::Parse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapturingReporter;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, CapturingReporter) {
        let mut reporter = CapturingReporter::new();
        let tokens = {
            let mut scanner = Scanner::new(source.to_string(), &mut reporter);
            scanner.scan_tokens().clone()
        };
        let mut parser = Parser::new(&tokens, &mut reporter);
        let stmts = parser.parse().unwrap_or_default();
        (stmts, reporter)
    }

    #[test]
    fn parses_an_arithmetic_expression_statement() {
        let (stmts, reporter) = parse("1 + 2 * 3;");
        assert_eq!(stmts.len(), 1);
        assert!(!reporter.had_error());
    }

    #[test]
    fn logical_and_binds_tighter_than_or() {
        let (stmts, reporter) = parse("print true or false and false;");
        assert_eq!(stmts.len(), 1);
        assert!(!reporter.had_error());
        match &stmts[0] {
            Stmt::Print { expression: Expr::Logical { operator, .. } } => {
                assert_eq!(operator.token_type, TokenType::Or);
            }
            other => panic!("expected a print of a logical-or expression, got {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_reports_an_error_and_recovers() {
        let (stmts, reporter) = parse("var a = 1\nvar b = 2;");
        assert!(reporter.had_error());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn class_with_superclass_and_methods_parses() {
        let (stmts, reporter) = parse("class B < A { greet() { return this.name; } }");
        assert!(!reporter.had_error());
        match &stmts[0] {
            Stmt::Class { superclass: Some(_), methods, .. } => assert_eq!(methods.len(), 1),
            other => panic!("expected a subclass declaration, got {other:?}"),
        }
    }
}
