//! Non-owning string views.
//!
//! A [`View`] is a cheap `Copy` window into a source buffer. Identifiers and file names the
//! lexer hands out are plain slices of the original text.

use std::fmt;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct View<'a> {
    data: &'a str,
}

impl<'a> View<'a> {
    pub fn new(data: &'a str) -> Self {
        View { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_str(&self) -> &'a str {
        self.data
    }

    /// Byte at `index`, if any
    pub fn at(&self, index: usize) -> Option<u8> {
        self.data.as_bytes().get(index).copied()
    }

    /// Drop the first character. An empty view stays empty.
    pub fn chop_left(self) -> Self {
        match self.data.chars().next() {
            Some(ch) => View::new(&self.data[ch.len_utf8()..]),
            None => self,
        }
    }

    pub fn trim_left(self) -> Self {
        View::new(self.data.trim_start_matches(|c: char| c.is_ascii_whitespace()))
    }

    pub fn trim_right(self) -> Self {
        View::new(self.data.trim_end_matches(|c: char| c.is_ascii_whitespace()))
    }

    pub fn trim(self) -> Self {
        self.trim_left().trim_right()
    }

    pub fn starts_with_char(&self, c: u8) -> bool {
        self.at(0) == Some(c)
    }

    pub fn starts_with(&self, prefix: View<'_>) -> bool {
        self.data.as_bytes().starts_with(prefix.data.as_bytes())
    }

    pub fn ends_with_char(&self, c: u8) -> bool {
        self.data.as_bytes().last() == Some(&c)
    }

    pub fn ends_with(&self, suffix: View<'_>) -> bool {
        self.data.as_bytes().ends_with(suffix.data.as_bytes())
    }

    pub fn contains(&self, needle: View<'_>) -> bool {
        self.find(needle).is_some()
    }

    /// Byte offset of the first occurrence of `needle`
    pub fn find(&self, needle: View<'_>) -> Option<usize> {
        let (haystack, needle) = (self.data.as_bytes(), needle.data.as_bytes());
        if needle.len() > haystack.len() {
            return None;
        }
        (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
    }

    pub fn first_of(&self, target: u8) -> Option<usize> {
        self.data.bytes().position(|b| b == target)
    }

    pub fn last_of(&self, target: u8) -> Option<usize> {
        self.data.bytes().rposition(|b| b == target)
    }

    /// Split on `c` into at most `max` pieces, the last piece keeping the remainder.
    pub fn split(&self, c: u8, max: usize) -> Vec<View<'a>> {
        let mut pieces = Vec::new();
        if max == 0 {
            return pieces;
        }

        let mut rest = self.data;
        while pieces.len() + 1 < max {
            match rest.bytes().position(|b| b == c) {
                Some(index) => {
                    pieces.push(View::new(&rest[..index]));
                    rest = &rest[index + 1..];
                }
                None => break,
            }
        }
        pieces.push(View::new(rest));
        pieces
    }

    /// Everything after the first `c`. Without a `c` the result is empty.
    pub fn chop(self, c: u8) -> Self {
        match self.first_of(c) {
            Some(index) => View::new(&self.data[index + 1..]),
            None => View::new(&self.data[self.data.len()..]),
        }
    }

    /// Decimal value of the leading digits, saturating on overflow
    pub fn to_int(&self) -> i64 {
        self.data
            .bytes()
            .take_while(u8::is_ascii_digit)
            .fold(0i64, |acc, b| {
                acc.saturating_mul(10).saturating_add((b - b'0') as i64)
            })
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data)
    }
}

impl fmt::Display for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data)
    }
}

impl<'a> From<&'a str> for View<'a> {
    fn from(data: &'a str) -> Self {
        View::new(data)
    }
}
