use chacha20poly1305::XChaCha20Poly1305;
use crypto_secretbox::XSalsa20Poly1305;
use std::{fmt, str::FromStr};

use super::{
	Error, Registry, SecretKey,
	cbc_hmac::{Aes128CbcHmacSha256128, Aes256CbcHmacSha256, CbcHmacSha2},
	secret_box,
};

/// An authenticated encryption algorithm that a [`SecretKey`] can be used with.
///
/// Every cipher has a stable, lowercase `algorithm` name, which is what appears in secret key
/// URIs and message headers, and a fixed raw key length.
///
/// | Algorithm                | Key bytes | Construction                   |
/// |--------------------------|-----------|--------------------------------|
/// | `aes256cbchmacsha256`    | 64        | AES-256-CBC, then HMAC-SHA-256 |
/// | `aes128cbchmacsha256128` | 64        | AES-256-CBC, then HMAC-SHA-256 |
/// | `xsalsa20poly1305`       | 32        | NaCl secretbox                 |
/// | `xchacha20poly1305`      | 32        | XChaCha20-Poly1305 AEAD        |
///
/// `aes128cbchmacsha256128` is computed exactly like `aes256cbchmacsha256`, whatever its name
/// suggests; it exists so that keys and messages already written under that name keep working.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Cipher {
	Aes256CbcHmacSha256,
	Aes128CbcHmacSha256128,
	XSalsa20Poly1305,
	XChaCha20Poly1305,
}

impl Cipher {
	/// Every cipher this crate knows how to use.
	pub const ALL: [Cipher; 4] = [
		Cipher::Aes256CbcHmacSha256,
		Cipher::Aes128CbcHmacSha256128,
		Cipher::XSalsa20Poly1305,
		Cipher::XChaCha20Poly1305,
	];

	pub fn algorithm(&self) -> &'static str {
		match self {
			Self::Aes256CbcHmacSha256 => "aes256cbchmacsha256",
			Self::Aes128CbcHmacSha256128 => "aes128cbchmacsha256128",
			Self::XSalsa20Poly1305 => "xsalsa20poly1305",
			Self::XChaCha20Poly1305 => "xchacha20poly1305",
		}
	}

	/// The exact number of raw key bytes this cipher requires.
	pub fn key_bytes(&self) -> usize {
		match self {
			Self::Aes256CbcHmacSha256 => Aes256CbcHmacSha256::KEY_BYTES,
			Self::Aes128CbcHmacSha256128 => Aes128CbcHmacSha256128::KEY_BYTES,
			Self::XSalsa20Poly1305 | Self::XChaCha20Poly1305 => 32,
		}
	}

	/// Generate a new random [`SecretKey`] for this cipher.
	pub fn random_key(&self) -> SecretKey {
		SecretKey::random(*self)
	}

	/// Encrypt `plaintext` under the raw `key`.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] if `key` is the wrong length for this cipher, or
	/// [`Error::Encryption`] if the underlying primitive fails.
	#[tracing::instrument(level = "trace", skip(key, plaintext))]
	pub fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
		match self {
			Self::Aes256CbcHmacSha256 => Aes256CbcHmacSha256::encrypt(key, plaintext),
			Self::Aes128CbcHmacSha256128 => {
				Aes128CbcHmacSha256128::encrypt(key, plaintext)
			}
			Self::XSalsa20Poly1305 => secret_box::seal::<XSalsa20Poly1305>(key, plaintext),
			Self::XChaCha20Poly1305 => secret_box::seal::<XChaCha20Poly1305>(key, plaintext),
		}
	}

	/// Decrypt and authenticate `ciphertext` under the raw `key`.
	///
	/// # Errors
	///
	/// [`Error::CorruptedMessage`] if the ciphertext fails authentication (or is otherwise not
	/// something this cipher produced), or [`Error::InvalidArgument`] if `key` is the wrong
	/// length.
	#[tracing::instrument(level = "trace", skip(key, ciphertext))]
	pub fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		match self {
			Self::Aes256CbcHmacSha256 => Aes256CbcHmacSha256::decrypt(key, ciphertext),
			Self::Aes128CbcHmacSha256128 => {
				Aes128CbcHmacSha256128::decrypt(key, ciphertext)
			}
			Self::XSalsa20Poly1305 => secret_box::open::<XSalsa20Poly1305>(key, ciphertext),
			Self::XChaCha20Poly1305 => secret_box::open::<XChaCha20Poly1305>(key, ciphertext),
		}
	}
}

impl fmt::Display for Cipher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.algorithm())
	}
}

impl FromStr for Cipher {
	type Err = Error;

	fn from_str(algorithm: &str) -> Result<Self, Error> {
		Registry::global().lookup(algorithm)
	}
}
