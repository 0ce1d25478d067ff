// A lexeme is the raw sequence of characters in the source code that represents a meaningful unit
// A token is a categorized representation of a lexeme, pairing it with its type

use crate::error::Reporter;
use crate::token::{Token, TokenType, KEYWORDS};

pub struct Scanner<'a> {
    // Scanned as a `Vec<char>` rather than indexing the raw `String` — Lox
    // source isn't restricted to ASCII, and `start`/`current` count
    // characters, not bytes, so a `String::get(start..current)` byte slice
    // would panic the moment a multi-byte character appeared earlier in
    // the file.
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: i32,
    reporter: &'a mut dyn Reporter,
}

impl<'a> Scanner<'a> {
    pub fn new(source: String, reporter: &'a mut dyn Reporter) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            reporter,
        }
    }

    pub fn scan_tokens(&mut self) -> &Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()
        }

        self.tokens.push(Token::new(TokenType::Eof, "", self.line));
        &self.tokens
    }

    fn scan_token(&mut self) {
        let c: char = self.advance();
        match c {
            // single char
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            // can be double char
            '!' => {
                if self.r#match('=') {
                    self.add_token(TokenType::BangEqual);
                } else {
                    self.add_token(TokenType::Bang);
                }
            }
            '=' => {
                if self.r#match('=') {
                    self.add_token(TokenType::EqualEqual);
                } else {
                    self.add_token(TokenType::Equal);
                }
            }
            '<' => {
                if self.r#match('=') {
                    self.add_token(TokenType::LessEqual);
                } else {
                    self.add_token(TokenType::Less);
                }
            }
            '>' => {
                if self.r#match('=') {
                    self.add_token(TokenType::GreaterEqual);
                } else {
                    self.add_token(TokenType::Greater);
                }
            }

            // can be comment
            '/' => {
                if self.r#match('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            // ignore whitespace
            ' ' | '\t' | '\r' => (),

            // handle new line
            '\n' => {
                self.line += 1;
            }

            '"' => self.string(),

            c => {
                if c.is_ascii_digit() {
                    self.number()
                } else if c.is_alphabetic() || c == '_' {
                    self.identifier()
                } else {
                    self.reporter.error(self.line, "Unexpected character.");
                }
            }
        }
    }

    // consume characters until we reach the closing "
    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.reporter.error(self.line, "Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        // trim the surrounding quotes
        let literal = self.source[(self.start + 1)..(self.current - 1)].iter().collect();

        self.add_token(TokenType::String { literal });
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // consume the .
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let literal: f64 = text
            .parse() // we could do .parse::<64> using the turbofish
            .expect("Scanned number could not be parsed");

        self.add_token(TokenType::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let tpe = KEYWORDS.get(text.as_str()).cloned().unwrap_or(TokenType::Identifier);

        self.add_token(tpe);
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.source[self.current - 1]
    }

    // it's like advance but doesn't consume the next character
    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(token_type, &text, self.line));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    // we only consume the current character if that is what we are looking for
    fn r#match(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }

        self.current += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapturingReporter;

    #[test]
    fn scans_a_simple_expression() {
        let mut reporter = CapturingReporter::new();
        let mut scanner = Scanner::new("1 + 2;".to_string(), &mut reporter);
        let tokens = scanner.scan_tokens();
        let types: Vec<_> = tokens.iter().map(|t| t.token_type.clone()).collect();
        assert_eq!(
            types,
            vec![
                TokenType::Number { literal: 1.0 },
                TokenType::Plus,
                TokenType::Number { literal: 2.0 },
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
        assert!(!reporter.had_error());
    }

    #[test]
    fn unterminated_string_reports_an_error() {
        let mut reporter = CapturingReporter::new();
        let mut scanner = Scanner::new("\"unterminated".to_string(), &mut reporter);
        scanner.scan_tokens();
        assert!(reporter.had_error());
    }

    #[test]
    fn keywords_and_identifiers_are_told_apart() {
        let mut reporter = CapturingReporter::new();
        let mut scanner = Scanner::new("var class1 = nil;".to_string(), &mut reporter);
        let tokens = scanner.scan_tokens();
        assert_eq!(tokens[0].token_type, TokenType::Var);
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].lexeme, "class1");
        assert_eq!(tokens[2].token_type, TokenType::Equal);
        assert_eq!(tokens[3].token_type, TokenType::Nil);
    }

    #[test]
    fn multi_byte_characters_earlier_in_the_source_do_not_desync_later_tokens() {
        let mut reporter = CapturingReporter::new();
        let mut scanner =
            Scanner::new("var café = 1; print café;".to_string(), &mut reporter);
        let tokens = scanner.scan_tokens();
        assert!(!reporter.had_error());
        assert_eq!(tokens[0].token_type, TokenType::Var);
        assert_eq!(tokens[1].lexeme, "café");
        assert_eq!(tokens[5].token_type, TokenType::Print);
        assert_eq!(tokens[6].lexeme, "café");
    }

    #[test]
    fn a_string_literal_containing_multi_byte_characters_scans_correctly() {
        let mut reporter = CapturingReporter::new();
        let mut scanner = Scanner::new("\"café\" + 1;".to_string(), &mut reporter);
        let tokens = scanner.scan_tokens();
        assert!(!reporter.had_error());
        assert_eq!(tokens[0].token_type, TokenType::String { literal: "café".to_string() });
        assert_eq!(tokens[1].token_type, TokenType::Plus);
    }
}
