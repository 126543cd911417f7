//! Secret server text protocol.
//!
//! One exchange per connection, newline-delimited plain text:
//!
//! ```text
//! S: Secret Server 1.0\n
//! S: Password:
//! C: <password>\n
//! S: The secret is: <secret>\n      (match)
//! S: Wrong password.\n              (anything else)
//! ```
//!
//! The server closes the connection after the reply.

use bytes::BytesMut;

/// Greeting sent as soon as a client connects
pub const BANNER: &[u8] = b"Secret Server 1.0\n";

/// Password prompt, no trailing newline
pub const PROMPT: &[u8] = b"Password:";

pub const SECRET_PREFIX: &[u8] = b"The secret is: ";

pub const WRONG_PASSWORD: &[u8] = b"Wrong password.\n";

/// Outcome of a password attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    Denied,
}

/// Compare a submitted line against the configured password, byte for byte.
pub fn verify(line: &[u8], password: &[u8]) -> Verdict {
    if line == password {
        Verdict::Granted
    } else {
        Verdict::Denied
    }
}

/// Build the reply for a verdict.
pub fn response(verdict: Verdict, secret: &[u8]) -> BytesMut {
    match verdict {
        Verdict::Granted => {
            let mut resp = BytesMut::with_capacity(SECRET_PREFIX.len() + secret.len() + 1);
            resp.extend_from_slice(SECRET_PREFIX);
            resp.extend_from_slice(secret);
            resp.extend_from_slice(b"\n");
            resp
        }
        Verdict::Denied => BytesMut::from(WRONG_PASSWORD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        assert_eq!(verify(b"swordfish", b"swordfish"), Verdict::Granted);
        assert_eq!(verify(b"wrong", b"swordfish"), Verdict::Denied);
        assert_eq!(verify(b"Swordfish", b"swordfish"), Verdict::Denied);
        assert_eq!(verify(b"swordfis", b"swordfish"), Verdict::Denied);
        assert_eq!(verify(b"swordfish!", b"swordfish"), Verdict::Denied);
        assert_eq!(verify(b"", b"swordfish"), Verdict::Denied);
    }

    #[test]
    fn test_empty_password_matches_empty_line() {
        assert_eq!(verify(b"", b""), Verdict::Granted);
    }

    #[test]
    fn test_granted_response() {
        let resp = response(Verdict::Granted, b"treasure");
        assert_eq!(&resp[..], b"The secret is: treasure\n");
    }

    #[test]
    fn test_denied_response_hides_secret() {
        let resp = response(Verdict::Denied, b"treasure");
        assert_eq!(&resp[..], b"Wrong password.\n");
    }
}
