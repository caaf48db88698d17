//! The lexer.

use derive_more::Display;
use regex::Regex;

use crate::common::Span;

/// Tokens in the program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
    /// Byte offset of the first character of this token.
    pub span: Span,
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display("let")]
    Let,
    #[display("in")]
    In,
    #[display("end")]
    End,
    #[display("if")]
    If,
    #[display("then")]
    Then,
    #[display("else")]
    Else,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("func")]
    Func,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display(",")]
    Comma,
    #[display(".")]
    Dot,
    #[display("=")]
    Equals,
    #[display("==")]
    EqEq,
    #[display("!=")]
    Ne,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
}

#[derive(Clone, Copy)]
pub struct LexError(pub usize, pub char);

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        use TokenKind::*;
        // Keywords are tried before the generic identifier pattern so that,
        // e.g., `in` doesn't lex as an identifier; `\b` keeps `interest`
        // lexing as a single identifier rather than `in` + `terest`.
        let keyword = |word: &str| Regex::new(&format!(r"\A{word}\b")).unwrap();
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://.*))*").unwrap(),
            matchers: vec![
                (keyword("let"), Let),
                (keyword("in"), In),
                (keyword("end"), End),
                (keyword("if"), If),
                (keyword("then"), Then),
                (keyword("else"), Else),
                (keyword("and"), And),
                (keyword("or"), Or),
                (keyword("func"), Func),
                (Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(), Id),
                (Regex::new(r"\A[0-9]+").unwrap(), Num),
                (Regex::new(r"\A==").unwrap(), EqEq),
                (Regex::new(r"\A!=").unwrap(), Ne),
                (Regex::new(r"\A<=").unwrap(), Le),
                (Regex::new(r"\A>=").unwrap(), Ge),
                (Regex::new(r"\A\(").unwrap(), LParen),
                (Regex::new(r"\A\)").unwrap(), RParen),
                (Regex::new(r"\A,").unwrap(), Comma),
                (Regex::new(r"\A\.").unwrap(), Dot),
                (Regex::new(r"\A=").unwrap(), Equals),
                (Regex::new(r"\A<").unwrap(), Lt),
                (Regex::new(r"\A>").unwrap(), Gt),
                (Regex::new(r"\A\+").unwrap(), Plus),
                (Regex::new(r"\A-").unwrap(), Minus),
                (Regex::new(r"\A\*").unwrap(), Mul),
                (Regex::new(r"\A/").unwrap(), Div),
            ],
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.skip_whitespace_peek() == self.input.len()
    }

    fn skip_whitespace_peek(&self) -> usize {
        match self.whitespace.find(&self.input[self.pos..]) {
            Some(m) => self.pos + m.end(),
            None => self.pos,
        }
    }

    // Skip comments and whitespace
    fn skip_whitespace(&mut self) {
        self.pos = self.skip_whitespace_peek();
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.pos == self.input.len() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];
        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let span = self.pos;
                let text = m.as_str();
                self.pos += m.end();
                return Ok(Some(Token {
                    kind: *kind,
                    text,
                    span,
                }));
            }
        }
        let bad = rest.chars().next().unwrap();
        Err(LexError(self.pos, bad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut out = vec![];
        while let Some(tok) = lexer.next().unwrap() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(kinds("let x = 10 in x end"), vec![Let, Id, Equals, Num, In, Id, End]);
    }

    #[test]
    fn keyword_boundary_does_not_split_identifiers() {
        use TokenKind::*;
        assert_eq!(kinds("interest"), vec![Id]);
    }

    #[test]
    fn lexes_comparison_operators_longest_match_first() {
        use TokenKind::*;
        assert_eq!(kinds("a <= b >= c != d == e"), vec![Id, Le, Id, Ge, Id, Ne, Id, EqEq, Id]);
    }

    #[test]
    fn skips_line_comments() {
        use TokenKind::*;
        assert_eq!(kinds("1 // trailing comment\n+ 2"), vec![Num, Plus, Num]);
    }

    #[test]
    fn reports_unexpected_character() {
        let mut lexer = Lexer::new("1 @ 2");
        assert!(lexer.next().unwrap().is_some());
        let err = lexer.next().unwrap_err();
        assert_eq!(err.1, '@');
    }
}
