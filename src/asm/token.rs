use crate::bytecode::{Op, ValueType};

/// Tokens of the assembly text
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Instruction(Op),
    /// Type word in front of a literal, eg. `push u8 7`
    Type(ValueType),
    Register(usize),
    Top,

    Newline,
    Colon,

    Str(Vec<u8>),
    Char(u8),
    Name(&'a str),

    Number(i64),
    Float(f64),
}

impl<'a> Token<'a> {
    pub fn new(token_str: &'a str) -> Self {
        if let Some(op) = Op::from_mnemonic(token_str) {
            return Token::Instruction(op);
        }

        match token_str {
            "top" => return Token::Top,
            // `reg` and `top` are operand kinds, not literal types
            "reg" => return Token::Name(token_str),
            _ => {}
        }
        if let Some(ty) = ValueType::from_name(token_str) {
            return Token::Type(ty);
        }

        match token_str.strip_prefix('r') {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                match digits.parse() {
                    Ok(index) => Token::Register(index),
                    Err(_) => Token::Name(token_str),
                }
            }
            _ => Token::Name(token_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        assert_eq!(Token::new("push_str"), Token::Instruction(Op::PushStr));
        assert_eq!(Token::new("u16"), Token::Type(ValueType::U16));
        assert_eq!(Token::new("top"), Token::Top);
        assert_eq!(Token::new("reg"), Token::Name("reg"));
        assert_eq!(Token::new("r12"), Token::Register(12));
        assert_eq!(Token::new("r"), Token::Name("r"));
        assert_eq!(Token::new("rest"), Token::Name("rest"));
    }
}
