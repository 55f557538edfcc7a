use crate::ast::{Accidental, NoteLetter};
use crate::error::ParseError;

/// Token types for the Clef language.
///
/// Keywords, dynamic marks, articulation/ornament/pedal names, and instrument names are
/// all lexed as a plain [`Token::Identifier`]; the parser dispatches on the string where
/// the grammar production requires a specific keyword. Pitches are recognized here as a
/// single token (`<letter><accidental?><octave>`) since they never contain whitespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBrace,
    RBrace,
    LAngle,
    RAngle,
    Comma,
    Colon,
    Slash,
    Dot,
    Sharp,
    Integer(u64),
    Pitch {
        letter: NoteLetter,
        accidental: Accidental,
        octave: i32,
    },
    Identifier(String),
    Eof,
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for tokenizing Clef source code.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            position: 0,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.rest().starts_with("//") => {
                    while !matches!(self.peek_char(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.rest().starts_with("/*") => {
                    self.advance();
                    self.advance();
                    while !self.rest().is_empty() && !self.rest().starts_with("*/") {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Attempts to lex `<letter><accidental?><octave>` (e.g. `C4`, `F#3`, `Bb2`) starting
    /// at the current position. Returns `None` without consuming input if the pattern
    /// does not match (in which case the caller falls back to identifier lexing).
    fn try_pitch(&mut self) -> Option<Token> {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        let (_, first) = chars.next()?;
        let letter = NoteLetter::from_char(first)?;

        let mut idx = first.len_utf8();
        let accidental = if rest[idx..].starts_with("##") {
            idx += 2;
            Accidental::DoubleSharp
        } else if rest[idx..].starts_with("bb") {
            idx += 2;
            Accidental::DoubleFlat
        } else if rest[idx..].starts_with('#') {
            idx += 1;
            Accidental::Sharp
        } else if rest[idx..].starts_with('b') {
            idx += 1;
            Accidental::Flat
        } else if rest[idx..].starts_with('n') {
            idx += 1;
            Accidental::Natural
        } else {
            Accidental::None
        };

        let octave_char = rest[idx..].chars().next()?;
        if !octave_char.is_ascii_digit() {
            return None;
        }
        let octave = octave_char.to_digit(10)? as i32;
        idx += octave_char.len_utf8();

        for _ in 0..idx.min(rest.len()) {
            self.advance();
        }

        Some(Token::Pitch {
            letter,
            accidental,
            octave,
        })
    }

    fn lex_identifier(&mut self) -> Token {
        let start = self.position;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Token::Identifier(self.input[start..self.position].to_string())
    }

    fn lex_integer(&mut self) -> Token {
        let start = self.position;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.position];
        Token::Integer(text.parse().unwrap_or(0))
    }

    fn source_line(&self, line: usize) -> String {
        self.input
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or("")
            .to_string()
    }

    pub fn tokenize(&mut self) -> Result<Vec<LocatedToken>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let line = self.line;
            let column = self.column;

            let Some(c) = self.peek_char() else {
                tokens.push(LocatedToken {
                    token: Token::Eof,
                    line,
                    column,
                });
                break;
            };

            if c.is_ascii_alphabetic() {
                if let Some(pitch) = self.try_pitch() {
                    tokens.push(LocatedToken {
                        token: pitch,
                        line,
                        column,
                    });
                    continue;
                }
                tokens.push(LocatedToken {
                    token: self.lex_identifier(),
                    line,
                    column,
                });
                continue;
            }

            if c.is_ascii_digit() {
                tokens.push(LocatedToken {
                    token: self.lex_integer(),
                    line,
                    column,
                });
                continue;
            }

            let token = match c {
                '{' => {
                    self.advance();
                    Token::LBrace
                }
                '}' => {
                    self.advance();
                    Token::RBrace
                }
                '<' => {
                    self.advance();
                    Token::LAngle
                }
                '>' => {
                    self.advance();
                    Token::RAngle
                }
                ',' => {
                    self.advance();
                    Token::Comma
                }
                ':' => {
                    self.advance();
                    Token::Colon
                }
                '/' => {
                    self.advance();
                    Token::Slash
                }
                '.' => {
                    self.advance();
                    Token::Dot
                }
                '#' => {
                    self.advance();
                    Token::Sharp
                }
                other => {
                    self.advance();
                    return Err(ParseError {
                        message: format!("Unexpected character '{other}'"),
                        line,
                        column,
                        source_line: self.source_line(line),
                    });
                }
            };

            tokens.push(LocatedToken {
                token,
                line,
                column,
            });
        }

        Ok(tokens)
    }
}
