//! Challenge-response digest for the HTSP `authenticate` request.

use sha1::{Digest, Sha1};

/// Compute the authentication digest `SHA1(password ‖ challenge)`.
///
/// The challenge is the binary salt from the server's `hello` response, used
/// verbatim; the password contributes its UTF-8 bytes.
///
/// # Examples
///
/// ```
/// use htsp::auth::challenge_digest;
///
/// let digest = challenge_digest("secret", &[0x01, 0x02]);
/// assert_eq!(digest.len(), 20);
/// ```
#[must_use]
pub fn challenge_digest(password: &str, challenge: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(challenge);
    hasher.finalize().into()
}
