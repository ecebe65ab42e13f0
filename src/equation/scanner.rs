use std::fmt;

use thiserror::Error;

#[derive(Debug)]
pub struct LatexScanner<'a> {
    source: &'a str,
    offset: usize,
    diagnostics: Vec<LexDiagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Command,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Superscript,
    Subscript,
    Plus,
    Minus,
    Times,
    NumLit,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// A character the scanner could not classify. It is skipped, not fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized character {character:?} at offset {offset}")]
pub struct LexDiagnostic {
    pub offset: usize,
    pub character: char,
}

/// Spacing commands spelled with a single punctuation character, e.g. `\,`.
const SPACING_COMMANDS: [char; 4] = [',', ';', ':', '!'];

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str) -> Self {
        Token { kind, text }
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.kind == TokenKind::Command && self.text == name
    }
}

impl<'a> LatexScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        LatexScanner {
            source,
            offset: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[LexDiagnostic] {
        &self.diagnostics
    }

    /// Splits off the first `len` bytes of the remaining source.
    fn take(&mut self, len: usize) -> &'a str {
        let (taken, rest) = self.source.split_at(len);
        self.source = rest;
        self.offset += len;
        taken
    }

    fn command_len(&self) -> usize {
        let rest = &self.source[1..];
        match rest.chars().next() {
            Some(c) if SPACING_COMMANDS.contains(&c) => 2,
            _ => {
                1 + rest
                    .find(|c: char| !c.is_ascii_alphabetic())
                    .unwrap_or(rest.len())
            }
        }
    }

    fn number_len(&self) -> usize {
        let mut seen_period = false;
        self.source
            .find(|c: char| {
                if c == '.' && !seen_period {
                    seen_period = true;
                    false
                } else {
                    !c.is_ascii_digit()
                }
            })
            .unwrap_or(self.source.len())
    }
}

impl<'a> Iterator for LatexScanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let next = self.source.chars().next()?;

            let kind = match next {
                '\\' => {
                    let len = self.command_len();
                    return Some(Token::new(TokenKind::Command, self.take(len)));
                }
                '0'..='9' => {
                    let len = self.number_len();
                    return Some(Token::new(TokenKind::NumLit, self.take(len)));
                }
                'a'..='z' | 'A'..='Z' => TokenKind::Variable,
                '{' => TokenKind::LeftBracket,
                '}' => TokenKind::RightBracket,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '^' => TokenKind::Superscript,
                '_' => TokenKind::Subscript,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Times,
                c if c.is_whitespace() => {
                    self.take(c.len_utf8());
                    continue;
                }
                c => {
                    let diagnostic = LexDiagnostic {
                        offset: self.offset,
                        character: c,
                    };
                    tracing::warn!("{diagnostic}");
                    self.diagnostics.push(diagnostic);
                    self.take(c.len_utf8());
                    continue;
                }
            };

            return Some(Token::new(kind, self.take(next.len_utf8())));
        }
    }
}

/// Scans the whole input. Unrecognized characters are reported and skipped.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Vec<Token<'_>> {
    LatexScanner::new(source).collect()
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
