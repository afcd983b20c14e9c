//! Textual notation for key sequences, as used by `bindkey`.
//!
//! | Notation        | Bytes                         |
//! |-----------------|-------------------------------|
//! | `^X`            | control character (`^?` = DEL) |
//! | `\e`, `\E`      | ESC                           |
//! | `\C-x`          | control character             |
//! | `\M-x`          | ESC followed by `x`           |
//! | `\n \r \t \a \b \f \v` | the usual C escapes    |
//! | `\xHH`, `\NNN`  | hex / octal byte              |
//! | `\\`, `\^`      | literal backslash / caret     |

use crate::error::{Result, ZleError};

const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;

const NON_ASCII_CONTROL: &str = "control modifier on non-ASCII key";

/// Parse `bindkey` notation into raw bytes.
///
/// # Errors
///
/// [`ZleError::InvalidKeySequence`] for an empty sequence or a dangling
/// escape.
pub fn parse_key_sequence(input: &str) -> Result<Vec<u8>> {
    let invalid = |reason: &str| ZleError::InvalidKeySequence {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let control_of = |ch: char| control(ch).ok_or_else(|| invalid(NON_ASCII_CONTROL));
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '^' => match chars.next() {
                Some(next) => out.push(control_of(next)?),
                None => out.push(b'^'),
            },
            '\\' => {
                let escaped = chars.next().ok_or_else(|| invalid("trailing backslash"))?;
                match escaped {
                    'e' | 'E' => out.push(ESC),
                    'n' => out.push(b'\n'),
                    'r' => out.push(b'\r'),
                    't' => out.push(b'\t'),
                    'a' => out.push(0x07),
                    'b' => out.push(0x08),
                    'f' => out.push(0x0c),
                    'v' => out.push(0x0b),
                    'C' | 'M' if chars.peek() == Some(&'-') => {
                        chars.next();
                        let target = chars
                            .next()
                            .ok_or_else(|| invalid("missing key after modifier"))?;
                        let byte = match target {
                            '^' => {
                                let next = chars.next().ok_or_else(|| invalid("dangling ^"))?;
                                control_of(next)?
                            }
                            c if c.is_ascii() => c as u8,
                            _ => return Err(invalid("modifier on non-ASCII key")),
                        };
                        if escaped == 'C' {
                            out.push(control_of(char::from(byte))?);
                        } else {
                            out.push(ESC);
                            out.push(byte);
                        }
                    }
                    'x' => {
                        let digits = take_digits(&mut chars, 16, 2);
                        if digits.is_empty() {
                            return Err(invalid("\\x without hex digits"));
                        }
                        out.push(radix_byte(&digits, 16).ok_or_else(|| invalid("bad hex"))?);
                    }
                    '0'..='7' => {
                        let mut digits = escaped.to_string();
                        digits.push_str(&take_digits(&mut chars, 8, 2));
                        let byte = radix_byte(&digits, 8)
                            .ok_or_else(|| invalid("octal out of range"))?;
                        out.push(byte);
                    }
                    other => push_char(&mut out, other),
                }
            }
            other => push_char(&mut out, other),
        }
    }
    if out.is_empty() {
        return Err(invalid("empty key sequence"));
    }
    Ok(out)
}

/// Render raw bytes in `bindkey` notation.
pub fn format_key_sequence(seq: &[u8]) -> String {
    let mut out = String::new();
    let mut idx = 0;
    while idx < seq.len() {
        let byte = seq[idx];
        match byte {
            DEL => out.push_str("^?"),
            0..=0x1f => {
                out.push('^');
                out.push((byte + 0x40) as char);
            }
            b'\\' => out.push_str("\\\\"),
            b'^' => out.push_str("\\^"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let width = utf8_len(byte);
                let decoded = seq
                    .get(idx..idx + width)
                    .and_then(|chunk| std::str::from_utf8(chunk).ok());
                if let Some(text) = decoded {
                    out.push_str(text);
                    idx += width;
                    continue;
                }
                out.push_str(&format!("\\x{byte:02X}"));
            }
        }
        idx += 1;
    }
    out
}

/// Length of the UTF-8 sequence introduced by `lead`, or 1 for bytes that
/// cannot start one.
pub const fn utf8_len(lead: u8) -> usize {
    match lead {
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 1,
    }
}

/// Control code for `ch`; `None` for keys outside ASCII.
fn control(ch: char) -> Option<u8> {
    match ch {
        '?' => Some(DEL),
        c if c.is_ascii() => Some((c.to_ascii_uppercase() as u8) & 0x1f),
        _ => None,
    }
}

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

fn take_digits(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    radix: u32,
    max: usize,
) -> String {
    let mut digits = String::new();
    while digits.len() < max
        && let Some(&c) = chars.peek()
        && c.is_digit(radix)
    {
        digits.push(c);
        chars.next();
    }
    digits
}

fn radix_byte(digits: &str, radix: u32) -> Option<u8> {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(|v| u8::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_notation() {
        assert_eq!(parse_key_sequence("^A").unwrap(), vec![0x01]);
        assert_eq!(parse_key_sequence("^x^e").unwrap(), vec![0x18, 0x05]);
        assert_eq!(parse_key_sequence("^?").unwrap(), vec![DEL]);
        assert_eq!(parse_key_sequence("^[").unwrap(), vec![ESC]);
    }

    #[test]
    fn test_escape_notation() {
        assert_eq!(parse_key_sequence("\\e[A").unwrap(), b"\x1b[A".to_vec());
        assert_eq!(parse_key_sequence("\\M-b").unwrap(), b"\x1bb".to_vec());
        assert_eq!(parse_key_sequence("\\C-a").unwrap(), vec![0x01]);
        assert_eq!(parse_key_sequence("\\M-^?").unwrap(), vec![ESC, DEL]);
        assert_eq!(parse_key_sequence("\\x41\\101").unwrap(), b"AA".to_vec());
        assert_eq!(parse_key_sequence("\\\\").unwrap(), b"\\".to_vec());
    }

    #[test]
    fn test_lone_caret_is_literal() {
        assert_eq!(parse_key_sequence("^").unwrap(), b"^".to_vec());
    }

    #[test]
    fn test_utf8_keys() {
        assert_eq!(parse_key_sequence("é").unwrap(), "é".as_bytes().to_vec());
    }

    #[test]
    fn test_invalid_sequences() {
        assert!(parse_key_sequence("").is_err());
        assert!(parse_key_sequence("a\\").is_err());
        assert!(parse_key_sequence("\\x").is_err());
        assert!(parse_key_sequence("\\M-").is_err());
        assert!(parse_key_sequence("^é").is_err());
    }

    #[test]
    fn test_control_of_non_ascii_is_rejected() {
        for input in ["^é", "a^日"] {
            let err = parse_key_sequence(input).unwrap_err();
            assert_eq!(
                err,
                ZleError::InvalidKeySequence {
                    input: input.to_string(),
                    reason: NON_ASCII_CONTROL.to_string(),
                }
            );
        }
        assert!(parse_key_sequence("\\C-é").is_err());
        assert_eq!(parse_key_sequence("\\C-^a").unwrap(), vec![0x01]);
    }

    #[test]
    fn test_format_uses_caret_notation() {
        assert_eq!(format_key_sequence(b"\x1b[A"), "^[[A");
        assert_eq!(format_key_sequence(&[0x18, 0x0f]), "^X^O");
        assert_eq!(format_key_sequence(&[DEL]), "^?");
        assert_eq!(format_key_sequence(b"a^\\"), "a\\^\\\\");
        assert_eq!(format_key_sequence("日".as_bytes()), "日");
        assert_eq!(format_key_sequence(&[0xff]), "\\xFF");
    }

    #[test]
    fn test_format_output_parses_back() {
        for seq in [&b"\x1b[3~"[..], b"^X", b"\x01\x7f", b"\\"] {
            assert_eq!(parse_key_sequence(&format_key_sequence(seq)).unwrap(), seq);
        }
    }
}
