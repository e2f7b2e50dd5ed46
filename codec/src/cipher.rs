//! Passcode cipher for channel traffic

use crate::CodecError;

/// Prefix carried by every enciphered text
pub const ENCRYPTION_MARKER: &str = "##";

/// Returns true if `text` carries the encryption marker
pub fn is_encrypted(text: &str) -> bool {
    text.starts_with(ENCRYPTION_MARKER)
}

/// Enciphers `text` with `passcode`
///
/// An empty passcode leaves the text untouched and unmarked.
pub fn encrypt(text: &str, passcode: &str) -> Result<String, CodecError> {
    if passcode.is_empty() {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(ENCRYPTION_MARKER.len() + text.len());
    out.push_str(ENCRYPTION_MARKER);
    out.push_str(&xor(text, passcode)?);
    Ok(out)
}

/// Reverses [`encrypt`]
///
/// A wrong passcode is not detected; it produces garbage.
pub fn decrypt(text: &str, passcode: &str) -> Result<String, CodecError> {
    let body = text
        .strip_prefix(ENCRYPTION_MARKER)
        .ok_or(CodecError::NotEncrypted)?;
    if passcode.is_empty() {
        return Ok(body.to_string());
    }
    xor(body, passcode)
}

fn xor(text: &str, passcode: &str) -> Result<String, CodecError> {
    if !passcode.is_ascii() {
        return Err(CodecError::NonAsciiPasscode);
    }
    let key = passcode.as_bytes();

    // XOR with a 7-bit key never moves a scalar value across the surrogate
    // gap, so the result is always a valid char.
    Ok(text
        .chars()
        .zip(key.iter().cycle())
        .map(|(c, &k)| char::from_u32(c as u32 ^ u32::from(k)).unwrap_or(c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_marks_and_changes_text() {
        let encrypted = encrypt("Hello, World!", "secret").unwrap();
        assert!(is_encrypted(&encrypted));
        assert!(!is_encrypted("Hello, World!"));
        assert_ne!(&encrypted[ENCRYPTION_MARKER.len()..], "Hello, World!");
    }

    #[test]
    fn test_decrypt_with_correct_passcode() {
        let encrypted = encrypt("Hello, World!", "secret").unwrap();
        assert_eq!(decrypt(&encrypted, "secret").unwrap(), "Hello, World!");
    }

    #[test]
    fn test_decrypt_with_wrong_passcode_gives_garbage() {
        let encrypted = encrypt("Hello, World!", "secret").unwrap();
        assert_ne!(decrypt(&encrypted, "wrong").unwrap(), "Hello, World!");
    }

    #[test]
    fn test_round_trip_non_ascii_text() {
        let text = r#"REQUEST::<header>{"OriginName":"Mütter ✓"}</header>"#;
        let encrypted = encrypt(text, "k3y").unwrap();
        assert_eq!(decrypt(&encrypted, "k3y").unwrap(), text);
    }

    #[test]
    fn test_empty_passcode_is_a_no_op() {
        assert_eq!(encrypt("plain", "").unwrap(), "plain");
        assert_eq!(decrypt("##plain", "").unwrap(), "plain");
    }

    #[test]
    fn test_decrypt_requires_marker() {
        assert_eq!(decrypt("plain", "secret"), Err(CodecError::NotEncrypted));
    }

    #[test]
    fn test_non_ascii_passcode_rejected() {
        assert_eq!(encrypt("plain", "pässword"), Err(CodecError::NonAsciiPasscode));
    }
}
