//! Cryptic ticket codes.
//!
//! A code is 16 symbols from a 32-symbol alphabet with no `I`, `L`, `O` or
//! `U`. The first 15 symbols are random and the last one is a Luhn mod 32
//! check symbol, so a mistyped symbol is caught before any lookup.

use rand::Rng;
use thiserror::Error;

use crate::utils::error::AppError;

pub const CODE_LEN: usize = 16;
pub const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const RADIX: u32 = ALPHABET.len() as u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("ticket code must be {CODE_LEN} characters, got {0}")]
    Length(usize),
    #[error("ticket code contains invalid character '{0}'")]
    Symbol(char),
    #[error("ticket code check character does not match")]
    Checksum,
}

impl From<CodeError> for AppError {
    fn from(err: CodeError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code: Vec<u8> = (0..CODE_LEN - 1)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect();
    let check = check_symbol(&code);
    code.push(check);
    // alphabet is ASCII
    code.into_iter().map(char::from).collect()
}

/// Uppercases, drops spaces and dashes, and folds look-alikes
/// (`O` to `0`, `I`/`L` to `1`).
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '\t'))
        .map(|c| match c.to_ascii_uppercase() {
            'O' => '0',
            'I' | 'L' => '1',
            other => other,
        })
        .collect()
}

/// Normalizes `input` and checks length, alphabet and check symbol.
pub fn validate(input: &str) -> Result<String, CodeError> {
    let code = normalize(input);
    let len = code.chars().count();
    if len != CODE_LEN {
        return Err(CodeError::Length(len));
    }
    let mut sum = 0;
    for (i, c) in code.chars().rev().enumerate() {
        let value = symbol_value(c).ok_or(CodeError::Symbol(c))?;
        let factor = if i % 2 == 0 { 1 } else { 2 };
        sum += fold(factor * value);
    }
    if sum % RADIX != 0 {
        return Err(CodeError::Checksum);
    }
    Ok(code)
}

/// `ABCD-EFGH-JKMN-PQRS`, the form printed on tickets.
pub fn display(code: &str) -> String {
    code.as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

fn check_symbol(payload: &[u8]) -> u8 {
    let mut sum = 0;
    for (i, b) in payload.iter().rev().enumerate() {
        let value = symbol_value(char::from(*b)).unwrap_or(0);
        let factor = if i % 2 == 0 { 2 } else { 1 };
        sum += fold(factor * value);
    }
    let check = (RADIX - sum % RADIX) % RADIX;
    ALPHABET[check as usize]
}

fn fold(addend: u32) -> u32 {
    addend / RADIX + addend % RADIX
}

fn symbol_value(c: char) -> Option<u32> {
    ALPHABET
        .iter()
        .position(|&a| char::from(a) == c)
        .map(|p| p as u32)
}
