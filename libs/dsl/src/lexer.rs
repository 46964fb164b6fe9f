//! Lexer for inline rule expressions.
//!
//! Converts expression strings such as `creditScore at_least MIN_CREDIT_SCORE`
//! into a token stream. Structural YAML tokens never reach this lexer; it only
//! sees the string payloads of `when:`, `then:`, `if.compare.*` and friends.

use crate::error::{Error, Result};
use crate::token::{Token, TokenType, WORD_OPERATORS};

/// The inline-expression lexer.
pub struct Lexer {
    position: usize,
    line: usize,
    column: usize,
    chars: Vec<char>,
    current_char: Option<char>,
}

impl Lexer {
    /// Create a new lexer for the given input.
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            position: 0,
            line: 1,
            column: 1,
            chars,
            current_char,
        }
    }

    /// Tokenize the whole input. The first error token aborts the scan.
    pub fn tokenize(input: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            match token.token_type {
                TokenType::Eof => {
                    tokens.push(token);
                    return Ok(tokens);
                }
                TokenType::Error => {
                    return Err(Error::Lexical {
                        message: token.value,
                        line: token.line,
                        column: token.column,
                    });
                }
                _ => tokens.push(token),
            }
        }
    }

    /// Advance to the next character.
    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.chars.get(self.position).copied();
    }

    /// Peek at the next character without advancing.
    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier or keyword.
    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start..self.position].iter().collect()
    }

    /// Read a number: integer or decimal, with optional scientific notation.
    fn read_number(&mut self) -> std::result::Result<String, String> {
        let start = self.position;
        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char == Some('.') && self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.advance(); // '.'
            while let Some(c) = self.current_char {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.current_char, Some('e') | Some('E')) {
            let mut lookahead = self.position + 1;
            if matches!(self.chars.get(lookahead), Some('+') | Some('-')) {
                lookahead += 1;
            }
            if self
                .chars
                .get(lookahead)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
            {
                self.advance(); // 'e'
                if matches!(self.current_char, Some('+') | Some('-')) {
                    self.advance();
                }
                while let Some(c) = self.current_char {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(self.chars[start..self.position].iter().collect())
    }

    /// Read a string literal delimited by `quote`. The opposite quote kind is
    /// accepted inside verbatim; backslash escapes are not interpreted.
    fn read_string(&mut self, quote: char) -> std::result::Result<(String, usize), String> {
        self.advance(); // opening quote
        let start = self.position;

        while let Some(c) = self.current_char {
            if c == quote {
                let value: String = self.chars[start..self.position].iter().collect();
                let length = self.position - start + 2;
                self.advance(); // closing quote
                return Ok((value, length));
            }
            self.advance();
        }

        Err(format!("Unterminated string literal (expected {})", quote))
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let position = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.current_char else {
            return Token::eof(position, line, column);
        };

        let simple = |token_type, value: &str| {
            Token::new(
                token_type,
                value.to_string(),
                position,
                line,
                column,
                value.chars().count(),
            )
        };

        match c {
            '(' => {
                self.advance();
                simple(TokenType::OpenParen, "(")
            }
            ')' => {
                self.advance();
                simple(TokenType::CloseParen, ")")
            }
            '[' => {
                self.advance();
                simple(TokenType::OpenBracket, "[")
            }
            ']' => {
                self.advance();
                simple(TokenType::CloseBracket, "]")
            }
            ',' => {
                self.advance();
                simple(TokenType::Comma, ",")
            }
            '.' => {
                self.advance();
                simple(TokenType::Dot, ".")
            }
            '+' => {
                self.advance();
                simple(TokenType::Plus, "+")
            }
            '-' => {
                self.advance();
                simple(TokenType::Minus, "-")
            }
            '*' => {
                self.advance();
                simple(TokenType::Multiply, "*")
            }
            '/' => {
                self.advance();
                simple(TokenType::Divide, "/")
            }
            '%' => {
                self.advance();
                simple(TokenType::Percent, "%")
            }
            '^' => {
                self.advance();
                simple(TokenType::Caret, "^")
            }
            '?' => {
                if self.peek() == Some('?') {
                    self.advance();
                    self.advance();
                    simple(TokenType::NullCoalesce, "??")
                } else {
                    self.advance();
                    Token::error(
                        "Unexpected character '?' (did you mean '??')".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    simple(TokenType::Equal, "==")
                } else {
                    self.advance();
                    Token::error(
                        "Unexpected character '=' (did you mean '==')".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    simple(TokenType::NotEqual, "!=")
                } else {
                    self.advance();
                    Token::error(
                        "Unexpected character '!' (did you mean '!=' or 'not')".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    simple(TokenType::LessThanOrEqual, "<=")
                } else {
                    self.advance();
                    simple(TokenType::LessThan, "<")
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    simple(TokenType::GreaterThanOrEqual, ">=")
                } else {
                    self.advance();
                    simple(TokenType::GreaterThan, ">")
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    self.advance();
                    simple(TokenType::And, "&&")
                } else {
                    self.advance();
                    Token::error(
                        "Unexpected character '&' (did you mean '&&' or 'and')".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    self.advance();
                    simple(TokenType::Or, "||")
                } else {
                    self.advance();
                    Token::error(
                        "Unexpected character '|' (did you mean '||' or 'or')".to_string(),
                        position,
                        line,
                        column,
                    )
                }
            }
            '\'' | '"' => match self.read_string(c) {
                Ok((value, length)) => {
                    Token::new(TokenType::StringLiteral, value, position, line, column, length)
                }
                Err(message) => Token::error(message, position, line, column),
            },
            _ if c.is_ascii_digit() => match self.read_number() {
                Ok(value) => {
                    let length = value.chars().count();
                    Token::new(TokenType::NumberLiteral, value, position, line, column, length)
                }
                Err(message) => Token::error(message, position, line, column),
            },
            _ if c.is_alphabetic() || c == '_' => {
                let word = self.read_identifier();
                let length = word.chars().count();
                let token_type = match word.as_str() {
                    "true" | "false" => TokenType::BooleanLiteral,
                    "null" => TokenType::NullLiteral,
                    "and" => TokenType::And,
                    "or" => TokenType::Or,
                    "not" => TokenType::Not,
                    "if" => TokenType::If,
                    "then" => TokenType::Then,
                    "else" => TokenType::Else,
                    "as" => TokenType::As,
                    "to" => TokenType::To,
                    w if WORD_OPERATORS.contains(&w) => TokenType::WordOp,
                    _ => TokenType::Identifier,
                };
                Token::new(token_type, word, position, line, column, length)
            }
            other => {
                self.advance();
                Token::error(
                    format!("Unexpected character '{}'", other),
                    position,
                    line,
                    column,
                )
            }
        }
    }
}
