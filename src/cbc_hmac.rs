//! Encrypt-then-MAC composition of a CBC-mode block cipher and an HMAC.
//!
//! This is the same computation as the AES_CBC_HMAC_SHA2 family of algorithms
//! (draft-mcgrew-aead-aes-cbc-hmac-sha2), except that the IV and the authentication tag are kept
//! as separate fields of the output instead of being concatenated onto the ciphertext:
//!
//! ```text
//! base64( base64(ciphertext) "--" base64(iv) ) "--" hex(tag)
//! ```
//!
//! The tag is computed over the outer base64 payload, and is always checked before any
//! decryption is attempted.
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{
	BlockCipher, BlockDecryptMut, BlockEncryptMut, IvSizeUser as _, KeyInit, KeyIvInit as _,
	block_padding::Pkcs7,
};
use hmac::{Hmac, Mac};
use rand::{RngCore as _, rng};
use sha2::Sha256;
use std::marker::PhantomData;

use super::Error;

// Standard base64 never produces a '-', so this can't appear inside an encoded field
const DELIMITER: &str = "--";

#[derive(Debug, thiserror::Error)]
pub(crate) enum CompositionError {
	#[error("invalid signature")]
	InvalidSignature,

	#[error("invalid message: {0}")]
	InvalidMessage(&'static str),
}

/// Compare two byte strings without short-circuiting on the first difference.
///
/// Inputs of different lengths are unequal (and the length is not secret).  Otherwise every byte
/// pair is XORed into an accumulator, and the result is only inspected once all bytes have been
/// visited.
pub(crate) fn secure_compare(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}

	constant_time_eq::constant_time_eq(a, b)
}

/// Signs and verifies messages with an HMAC, written out as lowercase hex.
pub(crate) struct MessageVerifier<'k, M = Hmac<Sha256>> {
	secret: &'k [u8],
	mac: PhantomData<fn() -> M>,
}

impl<'k, M: Mac + KeyInit> MessageVerifier<'k, M> {
	pub(crate) fn new(secret: &'k [u8]) -> Self {
		Self {
			secret,
			mac: PhantomData,
		}
	}

	#[tracing::instrument(level = "trace", skip_all)]
	pub(crate) fn generate(&self, value: &[u8]) -> Result<String, CompositionError> {
		let data = STANDARD.encode(value);
		let digest = self.digest(&data)?;

		Ok(format!("{data}{DELIMITER}{digest}"))
	}

	#[tracing::instrument(level = "trace", skip_all)]
	pub(crate) fn verify(&self, signed_message: &str) -> Result<Vec<u8>, CompositionError> {
		if signed_message.is_empty() {
			return Err(CompositionError::InvalidSignature);
		}

		let Some((data, digest)) = signed_message.split_once(DELIMITER) else {
			tracing::trace!("no signature delimiter");
			return Err(CompositionError::InvalidSignature);
		};

		if data.is_empty() || digest.is_empty() {
			return Err(CompositionError::InvalidSignature);
		}

		if !secure_compare(digest.as_bytes(), self.digest(data)?.as_bytes()) {
			tracing::trace!("signature mismatch");
			return Err(CompositionError::InvalidSignature);
		}

		STANDARD
			.decode(data)
			.map_err(|_| CompositionError::InvalidSignature)
	}

	fn digest(&self, data: &str) -> Result<String, CompositionError> {
		let mut mac = <M as Mac>::new_from_slice(self.secret)
			.map_err(|_| CompositionError::InvalidMessage("unusable MAC key"))?;
		mac.update(data.as_bytes());

		Ok(hex::encode(mac.finalize().into_bytes()))
	}
}

/// Encrypts with block cipher `C` in CBC mode, then signs the result with a [`MessageVerifier`].
pub(crate) struct MessageEncryptor<'k, C, M = Hmac<Sha256>> {
	secret: &'k [u8],
	verifier: MessageVerifier<'k, M>,
	cipher: PhantomData<fn() -> C>,
}

impl<'k, C, M> MessageEncryptor<'k, C, M>
where
	C: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit,
	M: Mac + KeyInit,
{
	pub(crate) fn new(secret: &'k [u8], verifier: MessageVerifier<'k, M>) -> Self {
		Self {
			secret,
			verifier,
			cipher: PhantomData,
		}
	}

	pub(crate) fn encrypt_and_sign(&self, value: &[u8]) -> Result<String, CompositionError> {
		self.verifier.generate(self.encrypt(value)?.as_bytes())
	}

	pub(crate) fn verify_and_decrypt(&self, value: &str) -> Result<Vec<u8>, CompositionError> {
		self.decrypt(&self.verifier.verify(value)?)
	}

	fn encrypt(&self, value: &[u8]) -> Result<String, CompositionError> {
		let mut iv = vec![0u8; cbc::Encryptor::<C>::iv_size()];
		rng().fill_bytes(&mut iv);

		let ciphertext = cbc::Encryptor::<C>::new_from_slices(self.secret, &iv)
			.map_err(|_| CompositionError::InvalidMessage("unusable encryption key"))?
			.encrypt_padded_vec_mut::<Pkcs7>(value);

		Ok(format!(
			"{}{DELIMITER}{}",
			STANDARD.encode(ciphertext),
			STANDARD.encode(&iv)
		))
	}

	fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CompositionError> {
		let payload = std::str::from_utf8(payload)
			.map_err(|_| CompositionError::InvalidMessage("payload is not text"))?;

		let Some((ciphertext, iv)) = payload.split_once(DELIMITER) else {
			return Err(CompositionError::InvalidMessage("missing IV"));
		};

		let ciphertext = STANDARD
			.decode(ciphertext)
			.map_err(|_| CompositionError::InvalidMessage("bad ciphertext encoding"))?;
		let iv = STANDARD
			.decode(iv)
			.map_err(|_| CompositionError::InvalidMessage("bad IV encoding"))?;

		cbc::Decryptor::<C>::new_from_slices(self.secret, &iv)
			.map_err(|_| CompositionError::InvalidMessage("bad IV length"))?
			.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
			.map_err(|_| CompositionError::InvalidMessage("bad padding"))
	}
}

/// A concrete member of the CBC+HMAC family.
///
/// The raw key is split down the middle: the first half keys the block cipher, the second half
/// keys the MAC.
pub(crate) trait CbcHmacSha2 {
	type BlockCipher: BlockCipher + BlockEncryptMut + BlockDecryptMut + KeyInit;
	type Mac: Mac + KeyInit;

	const KEY_BYTES: usize;

	fn encryptor(key: &[u8]) -> Result<MessageEncryptor<'_, Self::BlockCipher, Self::Mac>, Error> {
		if key.len() != Self::KEY_BYTES {
			return Err(Error::invalid_argument(format!(
				"wrong key size: {} (expected {})",
				key.len(),
				Self::KEY_BYTES
			)));
		}

		let (encryption_key, hmac_key) = key.split_at(Self::KEY_BYTES / 2);

		Ok(MessageEncryptor::new(
			encryption_key,
			MessageVerifier::new(hmac_key),
		))
	}

	fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
		Self::encryptor(key)?
			.encrypt_and_sign(plaintext)
			.map(String::into_bytes)
			.map_err(|e| {
				tracing::debug!(error=%e, "CBC+HMAC encryption failed");
				Error::Encryption
			})
	}

	fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		let encryptor = Self::encryptor(key)?;

		let signed_message = std::str::from_utf8(ciphertext)
			.map_err(|_| Error::corrupted_message("ciphertext is not text"))?;

		encryptor
			.verify_and_decrypt(signed_message)
			.map_err(|e| Error::corrupted_message(e.to_string()))
	}
}

/// AES-256-CBC with a full-length HMAC-SHA-256 tag, under a 64 byte key.
pub(crate) struct Aes256CbcHmacSha256;

impl CbcHmacSha2 for Aes256CbcHmacSha256 {
	type BlockCipher = aes::Aes256;
	type Mac = Hmac<Sha256>;

	const KEY_BYTES: usize = 64;
}

/// The `aes128cbchmacsha256128` algorithm.
///
/// Despite the name, existing keys and messages under this algorithm are AES-256-CBC with a
/// full-length HMAC-SHA-256 tag and a 64 byte key, so that is what it has to stay.
pub(crate) struct Aes128CbcHmacSha256128;

impl CbcHmacSha2 for Aes128CbcHmacSha256128 {
	type BlockCipher = aes::Aes256;
	type Mac = Hmac<Sha256>;

	const KEY_BYTES: usize = 64;
}
