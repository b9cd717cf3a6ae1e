use aes::Aes256;
use base64::{Engine as _, engine::general_purpose};
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};

use crate::CipherError;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// IV length prepended to every ciphertext.
pub const IV_LEN: usize = 16;

/// Encrypts `plaintext` with AES-256-CTR under `SHA-256(key)`.
///
/// The IV is random unless `iv_seed` is given, in which case it is
/// `MD5(iv_seed)` and the output is deterministic for the same inputs.
///
/// # Returns
/// `base64(IV ‖ ciphertext)`.
///
/// # Example
/// ```
/// use jwt_client_types::{decrypt, encrypt};
///
/// let sealed = encrypt("service-secret", "hello", None).unwrap();
/// assert_eq!(decrypt("service-secret", &sealed).unwrap(), "hello");
/// ```
pub fn encrypt(key: &str, plaintext: &str, iv_seed: Option<&str>) -> Result<String, CipherError> {
    if key.is_empty() {
        return Err(CipherError::NoEncryptKey);
    }
    if plaintext.is_empty() {
        return Err(CipherError::NoEncryptValue);
    }

    let iv: [u8; IV_LEN] = match iv_seed {
        Some(seed) => md5::compute(seed.as_bytes()).0,
        None => rand::random::<[u8; IV_LEN]>(),
    };

    let mut buffer = Vec::with_capacity(IV_LEN + plaintext.len());
    buffer.extend_from_slice(&iv);
    buffer.extend_from_slice(plaintext.as_bytes());

    let mut cipher = Aes256Ctr::new(&derive_key(key), &iv.into());
    cipher.apply_keystream(&mut buffer[IV_LEN..]);

    Ok(general_purpose::STANDARD.encode(buffer))
}

/// Decrypts output of [`encrypt`].
///
/// A wrong key does not fail here: CTR has no authentication, so the caller
/// gets garbage text and is expected to validate it (e.g. parse it as JSON).
pub fn decrypt(key: &str, encrypted: &str) -> Result<String, CipherError> {
    if key.is_empty() {
        return Err(CipherError::NoDecryptKey);
    }
    if encrypted.is_empty() {
        return Err(CipherError::NoDecryptValue);
    }

    let mut data = general_purpose::STANDARD
        .decode(encrypted.as_bytes())
        .map_err(|_| CipherError::MalformedPayload)?;
    if data.len() <= IV_LEN {
        return Err(CipherError::MalformedPayload);
    }

    let (iv, ciphertext) = data.split_at_mut(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::MalformedPayload)?;
    let mut cipher = Aes256Ctr::new(&derive_key(key), &iv.into());
    cipher.apply_keystream(ciphertext);

    Ok(String::from_utf8_lossy(ciphertext).into_owned())
}

fn derive_key(key: &str) -> aes::cipher::Key<Aes256> {
    Sha256::digest(key.as_bytes())
}
