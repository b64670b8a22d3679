//! Splits the init parameter string into whitespace-separated tokens.
//!
//! Only used while bringing the monitor up: the board support code hands a
//! blob like `"MRI_UART_MBED_USB MRI_UART_SHARE MRI_UART_BAUD=230400"` to
//! [`Monitor::init`](crate::Monitor::init), which tokenizes it here and
//! passes the result on to [`Platform::init`](crate::Platform::init).

use crate::error::Exception;

const MAX_STRING_LENGTH: usize = 64;
const MAX_TOKEN_COUNT: usize = 10;

pub struct Token {
    separators: &'static str,
    copy: [u8; MAX_STRING_LENGTH],
    tokens: [(u8, u8); MAX_TOKEN_COUNT],
    token_count: usize,
}

impl Token {
    pub fn new() -> Token {
        Token::with_separators(" \t")
    }

    pub fn with_separators(separators: &'static str) -> Token {
        Token {
            separators,
            copy: [0; MAX_STRING_LENGTH],
            tokens: [(0, 0); MAX_TOKEN_COUNT],
            token_count: 0,
        }
    }

    /// Copies `string` into the bounded internal storage and records the
    /// location of each token. Overlong input or too many tokens fail with
    /// `BufferOverrun`.
    pub fn split_string(&mut self, string: &str) -> Result<(), Exception> {
        self.token_count = 0;

        let bytes = string.as_bytes();
        if bytes.len() > MAX_STRING_LENGTH {
            return Err(Exception::BufferOverrun);
        }
        self.copy[..bytes.len()].copy_from_slice(bytes);

        let mut position = 0;
        while position < bytes.len() {
            while position < bytes.len() && self.is_separator(bytes[position]) {
                position += 1;
            }
            let start = position;
            while position < bytes.len() && !self.is_separator(bytes[position]) {
                position += 1;
            }
            if position > start {
                if self.token_count >= MAX_TOKEN_COUNT {
                    self.token_count = 0;
                    return Err(Exception::BufferOverrun);
                }
                self.tokens[self.token_count] = (start as u8, (position - start) as u8);
                self.token_count += 1;
            }
        }
        Ok(())
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn token(&self, index: usize) -> Result<&str, Exception> {
        if index >= self.token_count {
            return Err(Exception::InvalidIndex);
        }
        let (start, length) = self.tokens[index];
        let bytes = &self.copy[start as usize..start as usize + length as usize];
        std::str::from_utf8(bytes).map_err(|_| Exception::InvalidValue)
    }

    fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.token_count).filter_map(move |i| self.token(i).ok())
    }

    /// Finds a token exactly equal to `wanted`.
    pub fn matching_string(&self, wanted: &str) -> Option<&str> {
        self.iter().find(|&token| token == wanted)
    }

    /// Finds the first token starting with `prefix`, e.g. to locate a
    /// `KEY=VALUE` option by its `KEY=` prefix.
    pub fn matching_string_prefix(&self, prefix: &str) -> Option<&str> {
        self.iter().find(|token| token.starts_with(prefix))
    }

    fn is_separator(&self, character: u8) -> bool {
        self.separators.as_bytes().contains(&character)
    }
}

impl Default for Token {
    fn default() -> Token {
        Token::new()
    }
}
