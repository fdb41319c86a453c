//! Ciphers that are complete authenticated-encryption primitives in their own right.
//!
//! All we do here is pick a fresh random nonce, and stick it on the front of the primitive's
//! output (the NaCl "simple box" layout), so that callers get one opaque blob either way.
use chacha20poly1305::aead::{Aead, KeyInit};
use rand::{RngCore as _, rng};
use typenum::Unsigned as _;

use super::Error;

#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn seal<A: Aead + KeyInit>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
	let cipher = A::new_from_slice(key)
		.map_err(|_| Error::invalid_argument(format!("wrong key size: {}", key.len())))?;

	let mut nonce = chacha20poly1305::aead::Nonce::<A>::default();
	rng().fill_bytes(nonce.as_mut_slice());

	let ciphertext = cipher
		.encrypt(&nonce, plaintext)
		.map_err(|_| Error::Encryption)?;

	let mut boxed = Vec::with_capacity(nonce.len() + ciphertext.len());
	boxed.extend_from_slice(&nonce);
	boxed.extend_from_slice(&ciphertext);

	Ok(boxed)
}

#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn open<A: Aead + KeyInit>(key: &[u8], boxed: &[u8]) -> Result<Vec<u8>, Error> {
	let cipher = A::new_from_slice(key)
		.map_err(|_| Error::invalid_argument(format!("wrong key size: {}", key.len())))?;

	let nonce_bytes = A::NonceSize::USIZE;
	if boxed.len() < nonce_bytes + A::TagSize::USIZE {
		return Err(Error::corrupted_message("ciphertext too short"));
	}

	let (nonce, ciphertext) = boxed.split_at(nonce_bytes);

	cipher
		.decrypt(nonce.into(), ciphertext)
		.map_err(|_| Error::corrupted_message("decryption failed"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_init;
	use chacha20poly1305::XChaCha20Poly1305;
	use crypto_secretbox::XSalsa20Poly1305;

	const MESSAGE: &[u8] = b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE";

	#[test]
	fn round_trips() {
		test_init();
		let key = [0x11u8; 32];

		let boxed = seal::<XSalsa20Poly1305>(&key, MESSAGE).unwrap();
		assert_eq!(24 + MESSAGE.len() + 16, boxed.len());
		assert_eq!(MESSAGE.to_vec(), open::<XSalsa20Poly1305>(&key, &boxed).unwrap());

		let boxed = seal::<XChaCha20Poly1305>(&key, MESSAGE).unwrap();
		assert_eq!(MESSAGE.to_vec(), open::<XChaCha20Poly1305>(&key, &boxed).unwrap());
	}

	#[test]
	fn nonces_are_fresh() {
		test_init();
		let key = [0x22u8; 32];

		let first = seal::<XSalsa20Poly1305>(&key, MESSAGE).unwrap();
		let second = seal::<XSalsa20Poly1305>(&key, MESSAGE).unwrap();
		assert_ne!(first[..24], second[..24]);
		assert_ne!(first, second);
	}

	#[test]
	fn authentication_failures_are_corruption() {
		test_init();
		let key = [0x33u8; 32];

		let mut boxed = seal::<XSalsa20Poly1305>(&key, MESSAGE).unwrap();
		let last = boxed.len() - 1;
		boxed[last] ^= 0x01;
		assert!(matches!(
			open::<XSalsa20Poly1305>(&key, &boxed),
			Err(Error::CorruptedMessage(_))
		));

		assert!(matches!(
			open::<XSalsa20Poly1305>(&key, b"short"),
			Err(Error::CorruptedMessage(_))
		));

		let boxed = seal::<XSalsa20Poly1305>(&key, MESSAGE).unwrap();
		assert!(matches!(
			open::<XSalsa20Poly1305>(&[0x44u8; 32], &boxed),
			Err(Error::CorruptedMessage(_))
		));
	}

	#[test]
	fn wrong_key_size() {
		test_init();
		assert!(matches!(
			seal::<XChaCha20Poly1305>(&[0u8; 16], MESSAGE),
			Err(Error::InvalidArgument(_))
		));
	}
}
