use std::iter::Peekable;
use std::str::CharIndices;

use snafu::Snafu;

use crate::token::{Token, TokenKind};

#[derive(Debug)]
pub struct Scanner<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    start: usize,
    current: usize,
}

impl<'src> Scanner<'src> {
    /// Lexes `source` into a token stream terminated by a single `Eof`
    /// sentinel. Fails fast on the first unrecognized character or
    /// unterminated string literal.
    pub fn scan_tokens(source: &'src str) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        let mut scanner = Scanner {
            source,
            chars: source.char_indices().peekable(),
            start: 0,
            current: 0,
        };

        loop {
            scanner.start = scanner.current;
            match scanner.advance() {
                Some(c) => {
                    if let Some(token) = scanner.scan_token(c)? {
                        tokens.push(token);
                    }
                }
                None => break,
            }
        }

        tokens.push(Token::eof(source.len()));
        Ok(tokens)
    }

    fn scan_token(&mut self, c: char) -> Result<Option<Token>, LexError> {
        match c {
            // Whitespace
            c if c.is_whitespace() => Ok(None),

            // Line comment runs to end of line
            '#' => {
                while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
                Ok(None)
            }

            '"' | '\'' => Ok(Some(self.scan_string(c)?)),
            '0'..='9' => Ok(Some(self.scan_number(c))),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                Ok(Some(self.scan_number(c)))
            }
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.scan_identifier())),

            // Two-char operators, matched before their one-char prefixes
            '=' => Ok(Some(self.lookahead_op('='))),
            '!' => Ok(Some(self.lookahead_op('='))),
            '<' => Ok(Some(self.lookahead_op('='))),
            '>' => Ok(Some(self.lookahead_op('='))),
            '&' | '|' => {
                if self.peek() == Some(c) {
                    self.advance();
                    Ok(Some(self.op_token()))
                } else {
                    UnrecognizedCharacterSnafu {
                        found: c,
                        offset: self.start,
                    }
                    .fail()
                }
            }

            // Single-char operators / punctuation
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' => {
                Ok(Some(self.op_token()))
            }

            _ => UnrecognizedCharacterSnafu {
                found: c,
                offset: self.start,
            }
            .fail(),
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return UnterminatedStringSnafu { offset: self.start }.fail();
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    // any other escaped character is taken literally
                    Some(c) => value.push(c),
                    None => {
                        return UnterminatedStringSnafu { offset: self.start }.fail();
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(TokenKind::Str, value, self.start))
    }

    fn scan_number(&mut self, first: char) -> Token {
        let mut seen_dot = first == '.';
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Number, self.current_lexeme(), self.start)
    }

    fn scan_identifier(&mut self) -> Token {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                    self.advance();
                }
                // a dot continues the identifier only when another
                // identifier starts right after it: `a.b.c` is one token
                Some('.') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead
                        .next()
                        .is_some_and(|(_, c)| c.is_ascii_alphabetic() || c == '_')
                    {
                        self.advance();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        let lexeme = self.current_lexeme();
        if !lexeme.contains('.') && is_keyword(lexeme) {
            Token::new(TokenKind::Keyword, lexeme, self.start)
        } else {
            Token::new(TokenKind::Identifier, lexeme, self.start)
        }
    }

    // helper functions
    fn advance(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.current = idx + c.len_utf8();
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn lookahead_op(&mut self, expected: char) -> Token {
        if self.peek().is_some_and(|c| c == expected) {
            self.advance();
        }
        self.op_token()
    }

    fn op_token(&self) -> Token {
        Token::new(TokenKind::Op, self.current_lexeme(), self.start)
    }

    fn current_lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "let"
            | "if"
            | "else"
            | "while"
            | "fn"
            | "return"
            | "new"
            | "require"
            | "true"
            | "false"
            | "and"
            | "or"
            | "isnt"
            | "break"
            | "continue"
    )
}

#[derive(Debug, Snafu)]
pub enum LexError {
    #[snafu(display("offset {offset}: unrecognized character '{found}'"))]
    UnrecognizedCharacter { found: char, offset: usize },

    #[snafu(display("offset {offset}: unterminated string"))]
    UnterminatedString { offset: usize },
}
