use super::token::Token;
use crate::lexer::resolve_escape;
use anyhow::anyhow;
use std::str;

pub struct Lexer<'a> {
    program: &'a str,
    cursor: usize,
    line: usize,
}

type LResult<'a> = anyhow::Result<Option<Token<'a>>>;

impl<'a> Lexer<'a> {
    pub fn new(program: &'a str) -> Self {
        Lexer {
            program,
            cursor: 0,
            line: 1,
        }
    }

    /// Line of the last token read, 1-based
    pub fn line(&self) -> usize {
        self.line
    }

    /// Get the next token. This consumes the tokens.
    pub fn next_token(&mut self) -> LResult<'a> {
        self.trim();

        match self.next_char(false) {
            Some(b';') => {
                self.skip_comment();
                self.next_token()
            }
            Some(b'"') => self.read_str_literal(),
            Some(b'\'') => self.read_char_literal(),
            Some(b':') => Ok(Some(Token::Colon)),
            Some(b'\n') => {
                self.line += 1;
                Ok(Some(Token::Newline))
            }
            Some(ch) => {
                if ch.is_ascii_digit() || ch == b'-' {
                    self.read_number()
                } else if ch.is_ascii_alphabetic() || ch == b'_' {
                    self.read_token()
                } else {
                    Err(anyhow!(
                        "line {}: unexpected character `{}`",
                        self.line,
                        ch as char
                    ))
                }
            }

            None => Ok(None),
        }
    }

    /// Trim whitespaces, tabs, carriage returns, control chars
    fn trim(&mut self) {
        while let Some(ch) = self.next_char(true) {
            if ch != b'\t' && ch != b'\r' && ch != b'\x0C' && ch != b' ' {
                break;
            }
            self.cursor += 1;
        }
    }

    /// Skip to the end of the line, leaving the newline in place
    fn skip_comment(&mut self) {
        while let Some(ch) = self.next_char(true) {
            if ch == b'\n' {
                break;
            }
            self.cursor += 1;
        }
    }

    /// Read a decimal, `0x` hexadecimal, `0b` binary or floating point number
    fn read_number(&mut self) -> LResult<'a> {
        let start_pos = self.cursor - 1;
        while let Some(ch) = self.next_char(true) {
            if !ch.is_ascii_alphanumeric() && ch != b'.' && ch != b'_' {
                break;
            }
            self.cursor += 1;
        }

        let text = str::from_utf8(&self.program.as_bytes()[start_pos..self.cursor])?;
        let (negative, digits) = match text.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, text),
        };
        let digits = digits.replace('_', "");

        if digits.contains('.') {
            let number: f64 = digits
                .parse()
                .map_err(|_| anyhow!("line {}: invalid number `{}`", self.line, text))?;
            return Ok(Some(Token::Float(if negative { -number } else { number })));
        }

        let parsed = if let Some(hex) = digits.strip_prefix("0x") {
            u64::from_str_radix(hex, 16)
        } else if let Some(bin) = digits.strip_prefix("0b") {
            u64::from_str_radix(bin, 2)
        } else {
            digits.parse::<u64>()
        };
        let number = parsed.map_err(|_| anyhow!("line {}: invalid number `{}`", self.line, text))?
            as i64;

        Ok(Some(Token::Number(if negative {
            number.wrapping_neg()
        } else {
            number
        })))
    }

    /// Bytes up to the closing `delim` with escapes resolved
    fn read_quoted(&mut self, delim: u8) -> anyhow::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        while let Some(ch) = self.next_char(false) {
            match ch {
                b'\n' => break,
                b'\\' => {
                    let escaped = self.next_char(false).unwrap_or_default();
                    match resolve_escape(escaped) {
                        Some(byte) => bytes.push(byte),
                        None => {
                            return Err(anyhow!(
                                "line {}: unexpected escape character `{}`",
                                self.line,
                                escaped as char
                            ))
                        }
                    }
                }
                ch if ch == delim => return Ok(bytes),
                ch => bytes.push(ch),
            }
        }

        Err(anyhow!(
            "line {}: literal is not finished properly",
            self.line
        ))
    }

    /// Read a string literal that starts and ends with `"`
    fn read_str_literal(&mut self) -> LResult<'a> {
        let bytes = self.read_quoted(b'"')?;
        Ok(Some(Token::Str(bytes)))
    }

    /// Read a character literal that starts and ends with `'`
    fn read_char_literal(&mut self) -> LResult<'a> {
        match self.read_quoted(b'\'')?.as_slice() {
            [] => Ok(Some(Token::Char(0))),
            [ch] => Ok(Some(Token::Char(*ch))),
            _ => Err(anyhow!(
                "line {}: character cannot be made up of multiple characters",
                self.line
            )),
        }
    }

    /// Read any other token
    fn read_token(&mut self) -> LResult<'a> {
        let start_pos = self.cursor - 1;
        while let Some(ch) = self.next_char(false) {
            // Only alphanumberic characters and '_'
            if !ch.is_ascii_alphanumeric() && ch != b'_' {
                self.cursor -= 1;
                break;
            }
        }

        let token_str = str::from_utf8(&self.program.as_bytes()[start_pos..self.cursor])?;
        Ok(Some(Token::new(token_str)))
    }

    /// Get the next char and increase the cursor if `peek` is false
    fn next_char(&mut self, peek: bool) -> Option<u8> {
        if let Some(ch) = self.program.as_bytes().get(self.cursor) {
            if !peek {
                self.cursor += 1;
            }
            Some(*ch)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Op, ValueType};

    #[test]
    fn trim() {
        let program = "\t\r\x0C push_str \"hello\"";
        let mut lexer = Lexer::new(program);
        lexer.trim();
        assert_eq!(&lexer.program[lexer.cursor..], "push_str \"hello\"");
    }

    #[test]
    fn read_str_literal() {
        let mut lexer = Lexer::new("\"a\\tb\\n\"");
        let _ = lexer.next_char(false);
        let token = lexer.read_str_literal().unwrap();
        assert_eq!(Token::Str(b"a\tb\n".to_vec()), token.unwrap());

        let mut lexer = Lexer::new("\"open\n\"");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn read_number() {
        let mut lexer = Lexer::new("123 -456 0x1f 0b101 2.5 -0.5 1_000");
        let numbers: Vec<_> = std::iter::from_fn(|| lexer.next_token().unwrap()).collect();
        assert_eq!(
            numbers,
            vec![
                Token::Number(123),
                Token::Number(-456),
                Token::Number(31),
                Token::Number(5),
                Token::Float(2.5),
                Token::Float(-0.5),
                Token::Number(1000),
            ]
        );

        assert!(Lexer::new("12ab").next_token().is_err());
    }

    #[test]
    fn read_char_literal() {
        let mut lexer = Lexer::new("'a' '\\0' '' 'ab'");
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Char(b'a')));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Char(0)));
        assert_eq!(lexer.next_token().unwrap(), Some(Token::Char(0)));
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn read_program() {
        let program = r#"
            entrypoint main ; start here
            main:
            push u8 7
            mov r1 top
            push_str "hi"
            jmp main
        "#;

        let mut lexer = Lexer::new(program);

        let tokens = vec![
            Token::Newline,
            Token::Instruction(Op::Entrypoint),
            Token::Name("main"),
            Token::Newline,
            Token::Name("main"),
            Token::Colon,
            Token::Newline,
            Token::Instruction(Op::Push),
            Token::Type(ValueType::U8),
            Token::Number(7),
            Token::Newline,
            Token::Instruction(Op::Mov),
            Token::Register(1),
            Token::Top,
            Token::Newline,
            Token::Instruction(Op::PushStr),
            Token::Str(b"hi".to_vec()),
            Token::Newline,
            Token::Instruction(Op::Jmp),
            Token::Name("main"),
            Token::Newline,
        ];

        for token in tokens {
            assert_eq!(token, lexer.next_token().unwrap().unwrap());
        }

        // No tokens left
        assert_eq!(lexer.next_token().unwrap(), None);
        assert_eq!(lexer.line(), 8);
    }
}
