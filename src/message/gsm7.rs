// ABOUTME: GSM 03.38 default alphabet and extension table
// ABOUTME: Septets are carried one per octet, the way SMPP short_message holds the SMSC default alphabet

use crate::message::error::{DecodeError, EncodingError};

/// Escape to the extension table.
pub const ESCAPE: u8 = 0x1B;

#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Encoding of one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Septet {
    Basic(u8),
    /// Preceded by [`ESCAPE`] on the wire
    Extended(u8),
}

impl Septet {
    pub fn for_char(c: char) -> Option<Septet> {
        if c == '\u{1B}' {
            return None;
        }
        if let Some(code) = BASIC.iter().position(|&b| b == c) {
            return Some(Septet::Basic(code as u8));
        }
        EXTENSION
            .iter()
            .find(|(_, e)| *e == c)
            .map(|(code, _)| Septet::Extended(*code))
    }

    /// Septets this character occupies.
    pub fn width(self) -> usize {
        match self {
            Septet::Basic(_) => 1,
            Septet::Extended(_) => 2,
        }
    }

    pub fn write_to(self, out: &mut Vec<u8>) {
        match self {
            Septet::Basic(code) => out.push(code),
            Septet::Extended(code) => {
                out.push(ESCAPE);
                out.push(code);
            }
        }
    }
}

pub fn is_representable(text: &str) -> bool {
    text.chars().all(|c| Septet::for_char(c).is_some())
}

/// Septets `text` needs, or `None` if some character has no encoding.
pub fn septet_count(text: &str) -> Option<usize> {
    text.chars()
        .try_fold(0, |n, c| Septet::for_char(c).map(|s| n + s.width()))
}

pub fn encode(text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        Septet::for_char(c)
            .ok_or(EncodingError::Unrepresentable(c))?
            .write_to(&mut out);
    }
    Ok(out)
}

/// Decodes unpacked septets.
///
/// An escape followed by a code with no extension character decodes as the
/// basic character for that code; a doubled escape decodes as a space.
pub fn decode(septets: &[u8]) -> Result<String, DecodeError> {
    let mut text = String::with_capacity(septets.len());
    let mut bytes = septets.iter().copied();

    while let Some(septet) = bytes.next() {
        if septet > 0x7F {
            return Err(DecodeError::InvalidSeptet(septet));
        }
        if septet != ESCAPE {
            text.push(BASIC[septet as usize]);
            continue;
        }

        let code = bytes.next().ok_or(DecodeError::TruncatedEscape)?;
        if code > 0x7F {
            return Err(DecodeError::InvalidSeptet(code));
        }
        let c = match EXTENSION.iter().find(|(e, _)| *e == code) {
            Some((_, c)) => *c,
            None if code == ESCAPE => ' ',
            None => BASIC[code as usize],
        };
        text.push(c);
    }

    Ok(text)
}
