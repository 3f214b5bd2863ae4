use crate::error::{CompileError, CompileErrorKind};
use crate::token::{Location, Token, TokenKind};
use crate::view::View;
use log::warn;

pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
    file: &'a str,
    row: usize,
    line_start: usize,
}

type LResult<'a> = Result<Option<Token<'a>>, CompileError>;

/// Tokenize a whole (already preprocessed) source buffer.
pub fn lex<'a>(file: &'a str, source: &'a str) -> Result<Vec<Token<'a>>, CompileError> {
    let mut lexer = Lexer::new(file, source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

fn escape(c: u8) -> Option<u8> {
    Some(match c {
        b'n' => b'\n',
        b't' => b'\t',
        b'v' => 0x0B,
        b'b' => 0x08,
        b'r' => b'\r',
        b'f' => 0x0C,
        b'a' => 0x07,
        b'\\' => b'\\',
        b'?' => b'?',
        b'\'' => b'\'',
        b'"' => b'"',
        b'0' => b'\0',
        _ => return None,
    })
}

/// Resolve a single escape sequence character, shared with the assembler.
pub(crate) fn resolve_escape(c: u8) -> Option<u8> {
    escape(c)
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

fn is_word(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Value of the leading digits valid in `radix`, saturating like `strtoll`.
fn parse_radix_prefix(digits: &str, radix: u32) -> i64 {
    digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0i64, |acc, d| {
            acc.saturating_mul(radix as i64).saturating_add(d as i64)
        })
}

/// Everything up to a second `.` is the number, like `atof` would read it.
fn parse_float_prefix(text: &str) -> f64 {
    let end = text
        .match_indices('.')
        .nth(1)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0.0)
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a str, source: &'a str) -> Self {
        Lexer {
            source,
            cursor: 0,
            file,
            row: 1,
            line_start: 0,
        }
    }

    /// Get the next token. This consumes the tokens.
    pub fn next_token(&mut self) -> LResult<'a> {
        loop {
            self.trim();
            let loc = self.location();

            let Some(ch) = self.next_char(false) else {
                return Ok(None);
            };

            let kind = match ch {
                b'@' => {
                    self.read_directive(loc)?;
                    continue;
                }
                b'\0' => {
                    warn!("{loc} NOTE: Ignoring null-byte");
                    continue;
                }
                b'/' if self.next_char(true) == Some(b'/') => {
                    self.skip_comment();
                    continue;
                }
                b':' => TokenKind::Colon,
                b'(' => TokenKind::OParen,
                b')' => TokenKind::CParen,
                b'[' => TokenKind::OBracket,
                b']' => TokenKind::CBracket,
                b'{' => TokenKind::OCurly,
                b'}' => TokenKind::CCurly,
                b',' => TokenKind::Comma,
                b'.' => TokenKind::Dot,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Mult,
                b'/' => TokenKind::Div,
                b'%' => TokenKind::Mod,
                b'=' => self.pick(b'=', TokenKind::DoubleEq, TokenKind::Eq),
                b'>' => self.pick(b'=', TokenKind::GreaterEq, TokenKind::Greater),
                b'<' => self.pick(b'=', TokenKind::LessEq, TokenKind::Less),
                b'&' => self.pick(b'&', TokenKind::And, TokenKind::Ampersand),
                b'!' if self.next_char(true) == Some(b'=') => {
                    self.cursor += 1;
                    TokenKind::NotEq
                }
                b'|' if self.next_char(true) == Some(b'|') => {
                    self.cursor += 1;
                    TokenKind::Or
                }
                b'"' => self.read_str_literal(loc)?,
                b'\'' => self.read_char_literal(loc)?,
                ch if ch.is_ascii_alphabetic() => self.read_token(),
                ch if ch.is_ascii_digit() => self.read_number(ch),
                _ => {
                    let unexpected = self.source[self.cursor - 1..]
                        .chars()
                        .next()
                        .unwrap_or(ch as char);
                    return Err(CompileError::new(
                        loc,
                        CompileErrorKind::UnexpectedChar(unexpected),
                    ));
                }
            };

            return Ok(Some(Token::new(kind, loc)));
        }
    }

    fn location(&self) -> Location<'a> {
        Location::new(self.file, self.row, self.cursor - self.line_start)
    }

    /// The unread part of the source
    fn rest(&self) -> View<'a> {
        View::new(&self.source[self.cursor..])
    }

    fn newline(&mut self) {
        self.row += 1;
        self.line_start = self.cursor;
    }

    /// Trim whitespaces and newlines, counting rows
    fn trim(&mut self) {
        while let Some(ch) = self.next_char(true) {
            if !is_space(ch) {
                break;
            }
            self.cursor += 1;
            if ch == b'\n' {
                self.newline();
            }
        }
    }

    /// Two character operator if the next byte is `second`, else the single one
    fn pick(&mut self, second: u8, double: TokenKind<'a>, single: TokenKind<'a>) -> TokenKind<'a> {
        if self.next_char(true) == Some(second) {
            self.cursor += 1;
            double
        } else {
            single
        }
    }

    /// Skip a `//` comment up to, not including, the newline
    fn skip_comment(&mut self) {
        let len = self.rest().first_of(b'\n').unwrap_or(self.rest().len());
        self.cursor += len;
    }

    /// `@"file" line` retargets the reported location of the following line
    fn read_directive(&mut self, loc: Location<'a>) -> Result<(), CompileError> {
        let invalid = || CompileError::new(loc, CompileErrorKind::InvalidDirective);

        if self.next_char(false) != Some(b'"') {
            return Err(invalid());
        }
        let name_len = self.rest().first_of(b'"').ok_or_else(invalid)?;
        let file = &self.source[self.cursor..self.cursor + name_len];
        self.cursor += name_len + 1;
        if self.next_char(false) != Some(b' ') {
            return Err(invalid());
        }

        let digits_len = self.rest().first_of(b'\n').unwrap_or(self.rest().len());
        let digits = View::new(&self.source[self.cursor..self.cursor + digits_len]);
        if digits.is_empty() || !digits.as_str().bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        self.cursor += digits_len;
        if self.next_char(true) == Some(b'\n') {
            self.cursor += 1;
            self.line_start = self.cursor;
        }

        self.file = file;
        self.row = digits.to_int() as usize;
        Ok(())
    }

    /// Read up to the closing `delim`, resolving escapes.
    /// Returns the bytes and whether the closing delimiter was found.
    fn read_quoted(&mut self, loc: Location<'a>, delim: u8) -> Result<(Vec<u8>, bool), CompileError> {
        let mut word = Vec::new();
        while let Some(ch) = self.next_char(false) {
            match ch {
                c if c == delim => return Ok((word, true)),
                b'\\' if self.next_char(true).is_some() => {
                    let c = self.next_char(false).unwrap_or_default();
                    let value = escape(c).ok_or_else(|| {
                        CompileError::new(loc, CompileErrorKind::InvalidEscape(c as char))
                    })?;
                    word.push(value);
                }
                b'\n' => {
                    self.newline();
                    word.push(ch);
                }
                _ => word.push(ch),
            }
        }
        Ok((word, false))
    }

    /// Read a string literal that starts and ends with `"`
    fn read_str_literal(&mut self, loc: Location<'a>) -> Result<TokenKind<'a>, CompileError> {
        let (word, finished) = self.read_quoted(loc, b'"')?;
        if !finished {
            return Err(CompileError::new(loc, CompileErrorKind::UnterminatedString));
        }
        Ok(TokenKind::String(String::from_utf8_lossy(&word).into_owned()))
    }

    /// Read a char literal that starts and ends with `'`
    fn read_char_literal(&mut self, loc: Location<'a>) -> Result<TokenKind<'a>, CompileError> {
        let (word, finished) = self.read_quoted(loc, b'\'')?;
        if word.len() > 1 {
            return Err(CompileError::new(loc, CompileErrorKind::MultiCharLiteral));
        }
        if !finished {
            return Err(CompileError::new(loc, CompileErrorKind::UnterminatedChar));
        }
        Ok(TokenKind::Char(word.first().copied().unwrap_or(b'\0')))
    }

    /// Read a decimal, hex (`0x`), binary (`0b`) or floating literal
    fn read_number(&mut self, first: u8) -> TokenKind<'a> {
        let start = self.cursor - 1;

        if first == b'0' {
            let radix = match self.next_char(true) {
                Some(b'x') => Some(16),
                Some(b'b') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.cursor += 1;
                let mut digits = String::new();
                while let Some(ch) = self.next_char(true) {
                    if !is_word(ch) {
                        break;
                    }
                    self.cursor += 1;
                    if ch != b'_' {
                        digits.push(ch as char);
                    }
                }
                return TokenKind::Integer(parse_radix_prefix(&digits, radix));
            }
        }

        let mut is_float = false;
        while let Some(ch) = self.next_char(true) {
            if ch == b'.' {
                is_float = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            self.cursor += 1;
        }

        let text = View::new(&self.source[start..self.cursor]);
        if is_float {
            TokenKind::Float(parse_float_prefix(text.as_str()))
        } else {
            TokenKind::Integer(text.to_int())
        }
    }

    /// Read a keyword, type, builtin or identifier
    fn read_token(&mut self) -> TokenKind<'a> {
        let start = self.cursor - 1;
        while let Some(ch) = self.next_char(true) {
            // Only alphanumeric characters and '_'
            if !is_word(ch) {
                break;
            }
            self.cursor += 1;
        }

        TokenKind::new(&self.source[start..self.cursor])
    }

    /// Get the next byte and increase the cursor if `peek` is false
    fn next_char(&mut self, peek: bool) -> Option<u8> {
        let ch = self.source.as_bytes().get(self.cursor).copied()?;
        if !peek {
            self.cursor += 1;
        }
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Builtin;
    use crate::types::DataType;

    fn kinds(source: &str) -> Vec<TokenKind<'_>> {
        lex("test.tim", source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn error(source: &str) -> CompileErrorKind {
        lex("test.tim", source).unwrap_err().kind
    }

    #[test]
    fn trim() {
        let mut lexer = Lexer::new("test.tim", " \t\r\n\n  x");
        lexer.trim();
        assert_eq!(lexer.rest().as_str(), "x");
        assert_eq!(lexer.row, 3);
        assert_eq!(lexer.location().col, 2);
    }

    #[test]
    fn read_str_literal() {
        assert_eq!(
            kinds(r#""ab\tcd""#),
            vec![TokenKind::String("ab\tcd".to_string())]
        );
        assert_eq!(kinds(r#""\n\0\"""#), vec![TokenKind::String("\n\0\"".to_string())]);
        assert_eq!(error(r#""abc"#), CompileErrorKind::UnterminatedString);
        assert_eq!(error(r#""a\qb""#), CompileErrorKind::InvalidEscape('q'));
    }

    #[test]
    fn read_char_literal() {
        assert_eq!(kinds("'a'"), vec![TokenKind::Char(b'a')]);
        assert_eq!(kinds(r"'\n'"), vec![TokenKind::Char(b'\n')]);
        assert_eq!(kinds("''"), vec![TokenKind::Char(b'\0')]);
        assert_eq!(error("'ab'"), CompileErrorKind::MultiCharLiteral);
        assert_eq!(error("'a"), CompileErrorKind::UnterminatedChar);
    }

    #[test]
    fn read_number() {
        assert_eq!(kinds("0x1F"), vec![TokenKind::Integer(31)]);
        assert_eq!(kinds("0b101"), vec![TokenKind::Integer(5)]);
        assert_eq!(kinds("0xFF_FF"), vec![TokenKind::Integer(0xFFFF)]);
        assert_eq!(kinds("1234"), vec![TokenKind::Integer(1234)]);
        assert_eq!(kinds("3.14"), vec![TokenKind::Float(3.14)]);
        assert_eq!(kinds("0"), vec![TokenKind::Integer(0)]);
    }

    #[test]
    fn second_dot_is_ignored() {
        // Conversion stops at the second dot, the whole run is still one token.
        assert_eq!(kinds("1.2.3"), vec![TokenKind::Float(1.2)]);
    }

    #[test]
    fn read_token() {
        assert_eq!(
            kinds("while foo_1 u8 get"),
            vec![
                TokenKind::While,
                TokenKind::Ident("foo_1"),
                TokenKind::Type(DataType::U8),
                TokenKind::Builtin(Builtin::Get),
            ]
        );
        // `_` can not start a word
        assert_eq!(error("_x"), CompileErrorKind::UnexpectedChar('_'));
    }

    #[test]
    fn operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("== != >= <= > < + - * / % && || & = :"),
            vec![
                DoubleEq, NotEq, GreaterEq, LessEq, Greater, Less, Plus, Minus, Mult, Div, Mod,
                And, Or, Ampersand, Eq, Colon
            ]
        );
        assert_eq!(error("a | b"), CompileErrorKind::UnexpectedChar('|'));
        assert_eq!(error("!a"), CompileErrorKind::UnexpectedChar('!'));
        assert_eq!(error("#"), CompileErrorKind::UnexpectedChar('#'));
    }

    #[test]
    fn comments_and_null_bytes() {
        assert_eq!(
            kinds("a // b c\n/ d\0"),
            vec![TokenKind::Ident("a"), TokenKind::Div, TokenKind::Ident("d")]
        );
    }

    #[test]
    fn locations() {
        let tokens = lex("main.tim", "x: int\n  y = 5").unwrap();
        let locs: Vec<(usize, usize)> = tokens.iter().map(|t| (t.loc.row, t.loc.col)).collect();
        assert_eq!(locs, vec![(1, 0), (1, 1), (1, 3), (2, 2), (2, 4), (2, 6)]);
        assert!(tokens.iter().all(|t| t.loc.file == "main.tim"));
    }

    #[test]
    fn directive() {
        let tokens = lex("main.tim", "a\n@\"lib.tim\" 10\nb c\nd").unwrap();
        assert_eq!(tokens[0].loc, Location::new("main.tim", 1, 0));
        assert_eq!(tokens[1].loc, Location::new("lib.tim", 10, 0));
        assert_eq!(tokens[2].loc, Location::new("lib.tim", 10, 2));
        assert_eq!(tokens[3].loc, Location::new("lib.tim", 11, 0));

        assert_eq!(error("@lib.tim 3\n"), CompileErrorKind::InvalidDirective);
        assert_eq!(error("@\"lib.tim 3\n"), CompileErrorKind::InvalidDirective);
        assert_eq!(error("@\"lib.tim\" 3a\n"), CompileErrorKind::InvalidDirective);
    }

    #[test]
    fn directive_needs_a_space_and_a_row() {
        assert_eq!(error("@\"a\"\u{e9}1\nx: int = 1\n"), CompileErrorKind::InvalidDirective);
        assert_eq!(error("@\"a\"\n12\nx"), CompileErrorKind::InvalidDirective);
        assert_eq!(error("@\"a\" \nx"), CompileErrorKind::InvalidDirective);
        assert_eq!(error("@\"a\""), CompileErrorKind::InvalidDirective);

        let err = lex("main.tim", "x\n@\"a\"\u{e9}1").unwrap_err();
        assert_eq!((err.row, err.col), (2, 0));
    }

    #[test]
    fn read_program() {
        use TokenKind::*;
        let program = r#"
            struct Point { x: int, y: int, }
            add(a: int, b: int): int
                return a + b
            end
            p: Point = {1, 2}
            if p.x == 1 then
                write "one\n"
            end
        "#;

        let tokens = vec![
            Struct,
            Ident("Point"),
            OCurly,
            Ident("x"),
            Colon,
            Type(DataType::Int),
            Comma,
            Ident("y"),
            Colon,
            Type(DataType::Int),
            Comma,
            CCurly,
            Ident("add"),
            OParen,
            Ident("a"),
            Colon,
            Type(DataType::Int),
            Comma,
            Ident("b"),
            Colon,
            Type(DataType::Int),
            CParen,
            Colon,
            Type(DataType::Int),
            Return,
            Ident("a"),
            Plus,
            Ident("b"),
            End,
            Ident("p"),
            Colon,
            Ident("Point"),
            Eq,
            OCurly,
            Integer(1),
            Comma,
            Integer(2),
            CCurly,
            If,
            Ident("p"),
            Dot,
            Ident("x"),
            DoubleEq,
            Integer(1),
            Then,
            Write,
            String("one\n".to_string()),
            End,
        ];

        assert_eq!(kinds(program), tokens);
    }
}
