use base64::{
	Engine as _, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use secrecy::{ExposeSecret as _, SecretSlice, SecretString};
use std::{fmt, str::FromStr};

use super::{Cipher, Error, Fingerprint, Registry};

const SCHEME: &str = "secret.key";

// We only ever write unpadded keys, but padded ones are still readable
const KEY_ENCODING: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new()
		.with_encode_padding(false)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A key for one particular [`Cipher`].
///
/// The canonical form of a key is a URI that names the cipher and carries the raw key bytes in
/// URL-safe base64, like `secret.key:///xsalsa20poly1305;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8`.
/// That's what you'd keep in your secret store, and pass to [`SecretKey::parse`] when you want the
/// key back.
///
/// The key material is wiped from memory when the key is dropped, and is never shown by the
/// [`Debug`](fmt::Debug) representation, which only includes the cipher and the key's
/// [`Fingerprint`].
///
/// # Example
///
/// ```rust
/// use cryptor::{Cipher, SecretKey};
/// use cryptor::secrecy::ExposeSecret as _;
/// # fn main() -> Result<(), cryptor::Error> {
///
/// let key = SecretKey::random(Cipher::Aes256CbcHmacSha256);
/// let uri = key.to_uri();
///
/// let same_key = SecretKey::parse(uri.expose_secret())?;
/// assert_eq!(key.fingerprint(), same_key.fingerprint());
///
/// let ciphertext = key.encrypt(b"Hello, world!")?;
/// assert_eq!(b"Hello, world!".to_vec(), same_key.decrypt(&ciphertext)?);
/// # Ok(())
/// # }
/// ```
pub struct SecretKey {
	cipher: Cipher,
	key: SecretSlice<u8>,
}

impl SecretKey {
	/// Wrap raw key bytes for use with `cipher`.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] if `key` isn't exactly [`Cipher::key_bytes`] long.
	pub fn new(cipher: Cipher, key: impl Into<Vec<u8>>) -> Result<Self, Error> {
		let key: Vec<u8> = key.into();
		let key = SecretSlice::from(key);

		if key.expose_secret().len() != cipher.key_bytes() {
			return Err(Error::invalid_argument(format!(
				"wrong key size for {cipher}: {} (expected {})",
				key.expose_secret().len(),
				cipher.key_bytes()
			)));
		}

		Ok(Self { cipher, key })
	}

	/// Generate a new key for `cipher` from the system's secure random number generator.
	#[tracing::instrument(level = "debug")]
	pub fn random(cipher: Cipher) -> Self {
		use rand::{RngCore as _, rng};

		let mut k = vec![0u8; cipher.key_bytes()];

		rng().fill_bytes(&mut k);

		Self {
			cipher,
			key: k.into(),
		}
	}

	/// Parse a `secret.key:///` URI, looking up its cipher in the [global
	/// registry](Registry::global).
	///
	/// # Errors
	///
	/// * [`Error::InvalidArgument`] if the URI is malformed, or the key is the wrong length for its
	///   cipher.
	/// * [`Error::UnknownCipher`] if the URI names a cipher that isn't registered.
	pub fn parse(uri: &str) -> Result<Self, Error> {
		Self::parse_with(uri, Registry::global())
	}

	/// Parse a `secret.key:///` URI, looking up its cipher in `registry`.
	///
	/// # Errors
	///
	/// As for [`SecretKey::parse`].
	#[tracing::instrument(level = "debug", skip(uri, registry))]
	pub fn parse_with(uri: &str, registry: &Registry) -> Result<Self, Error> {
		let Some((scheme, rest)) = uri.split_once(':') else {
			return Err(Error::invalid_argument("secret key is not a URI"));
		};

		if scheme != SCHEME {
			return Err(Error::invalid_argument(format!("invalid scheme: {scheme}")));
		}

		// Only an empty authority is acceptable
		let Some(path) = rest.strip_prefix("///") else {
			return Err(Error::invalid_argument("malformed secret key URI"));
		};

		let Some((algorithm, encoded)) = path
			.split_once(';')
			.filter(|(a, e)| !a.is_empty() && !e.is_empty())
		else {
			return Err(Error::invalid_argument(
				"couldn't parse cipher name from secret URI",
			));
		};

		let cipher = registry.lookup(algorithm)?;

		let key = KEY_ENCODING
			.decode(encoded)
			.map_err(|_| Error::invalid_argument("secret key is not valid base64"))?;

		let key = Self::new(cipher, key)?;
		tracing::debug!(algorithm, fingerprint=%key.fingerprint(), "Parsed secret key");

		Ok(key)
	}

	pub fn cipher(&self) -> Cipher {
		self.cipher
	}

	pub fn expose_secret(&self) -> &[u8] {
		self.key.expose_secret()
	}

	/// The canonical URI form of this key.
	pub fn to_uri(&self) -> SecretString {
		format!(
			"{SCHEME}:///{};{}",
			self.cipher.algorithm(),
			KEY_ENCODING.encode(self.key.expose_secret())
		)
		.into()
	}

	/// The [`Fingerprint`] of this key's canonical URI.
	pub fn fingerprint(&self) -> Fingerprint {
		Fingerprint::of(self.to_uri().expose_secret().as_bytes())
	}

	/// Encrypt `plaintext` with this key's cipher.
	///
	/// # Errors
	///
	/// [`Error::Encryption`] in the (extremely unlikely) event the cipher fails.
	#[tracing::instrument(level = "debug", skip_all, fields(algorithm = self.cipher.algorithm()))]
	pub fn encrypt(&self, plaintext: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
		self.cipher
			.encrypt(self.key.expose_secret(), plaintext.as_ref())
	}

	/// Decrypt `ciphertext` with this key's cipher.
	///
	/// # Errors
	///
	/// [`Error::CorruptedMessage`] if the ciphertext was tampered with, or was not encrypted with
	/// this key.
	#[tracing::instrument(level = "debug", skip_all, fields(algorithm = self.cipher.algorithm()))]
	pub fn decrypt(&self, ciphertext: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
		self.cipher
			.decrypt(self.key.expose_secret(), ciphertext.as_ref())
	}
}

impl Clone for SecretKey {
	fn clone(&self) -> Self {
		Self {
			cipher: self.cipher,
			key: self.key.expose_secret().to_vec().into(),
		}
	}
}

impl PartialEq for SecretKey {
	fn eq(&self, other: &Self) -> bool {
		self.fingerprint() == other.fingerprint()
	}
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SecretKey")
			.field("cipher", &self.cipher.algorithm())
			.field("fingerprint", &self.fingerprint().as_str())
			.finish()
	}
}

impl FromStr for SecretKey {
	type Err = Error;

	fn from_str(uri: &str) -> Result<Self, Error> {
		Self::parse(uri)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_init;

	const KNOWN_URI: &str =
		"secret.key:///xsalsa20poly1305;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

	fn known_bytes() -> Vec<u8> {
		(0u8..32).collect()
	}

	#[test]
	fn generates_random_keys() {
		test_init();
		for cipher in Cipher::ALL {
			let key = SecretKey::random(cipher);
			assert_eq!(cipher, key.cipher());
			assert_eq!(cipher.key_bytes(), key.expose_secret().len());
		}

		assert_ne!(
			SecretKey::random(Cipher::XSalsa20Poly1305),
			SecretKey::random(Cipher::XSalsa20Poly1305)
		);
	}

	#[test]
	fn serializes_to_a_uri() {
		test_init();
		let key = SecretKey::new(Cipher::XSalsa20Poly1305, known_bytes()).unwrap();

		assert_eq!(KNOWN_URI, key.to_uri().expose_secret());
	}

	#[test]
	fn parses_a_uri() {
		test_init();
		let key = SecretKey::parse(KNOWN_URI).unwrap();

		assert_eq!(Cipher::XSalsa20Poly1305, key.cipher());
		assert_eq!(known_bytes(), key.expose_secret());
	}

	#[test]
	fn parses_padded_uris() {
		test_init();
		let key = SecretKey::parse(
			"secret.key:///xsalsa20poly1305;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=",
		)
		.unwrap();

		assert_eq!(KNOWN_URI, key.to_uri().expose_secret());
	}

	#[test]
	fn uris_round_trip() {
		test_init();
		for cipher in Cipher::ALL {
			let key = SecretKey::random(cipher);
			let parsed: SecretKey = key.to_uri().expose_secret().parse().unwrap();

			assert_eq!(key.expose_secret(), parsed.expose_secret());
			assert_eq!(key.cipher(), parsed.cipher());
		}
	}

	#[test]
	fn serializes_to_a_key_fingerprint() {
		test_init();
		let key = SecretKey::parse(KNOWN_URI).unwrap();

		assert_eq!(
			"ni:///sha-256;zgqOwsEEzPrNd_nMoJOow1yC7j5SrbWXcYYIbWS6Rc8",
			key.fingerprint().as_str()
		);
		assert_eq!(key.fingerprint(), key.fingerprint());
		assert_eq!(key.fingerprint(), key.clone().fingerprint());
	}

	#[test]
	fn fingerprint_depends_on_cipher_and_bytes() {
		test_init();
		let salsa = SecretKey::new(Cipher::XSalsa20Poly1305, known_bytes()).unwrap();
		let chacha = SecretKey::new(Cipher::XChaCha20Poly1305, known_bytes()).unwrap();
		assert_ne!(salsa.fingerprint(), chacha.fingerprint());

		let mut other_bytes = known_bytes();
		other_bytes[31] ^= 1;
		let other = SecretKey::new(Cipher::XSalsa20Poly1305, other_bytes).unwrap();
		assert_ne!(salsa.fingerprint(), other.fingerprint());
	}

	#[test]
	fn inspects_without_revealing_the_secret_key() {
		test_init();
		let key = SecretKey::parse(KNOWN_URI).unwrap();
		let debug = format!("{key:?}");

		assert!(debug.contains("xsalsa20poly1305"));
		assert!(debug.contains(key.fingerprint().as_str()));
		assert!(!debug.contains("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8"));
		assert!(!debug.contains(&format!("{:?}", known_bytes())));
	}

	#[test]
	fn rejects_bogus_uris() {
		test_init();
		for bogus in [
			"http://www.google.com/",
			"not a uri",
			"secret.key://",
			"secret.key:///",
			"secret.key:///xsalsa20poly1305",
			"secret.key:///xsalsa20poly1305;",
			"secret.key:///;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8",
			"secret.key://example.com/xsalsa20poly1305;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8",
			"secret.key:///xsalsa20poly1305;not*base64",
		] {
			assert!(
				matches!(SecretKey::parse(bogus), Err(Error::InvalidArgument(_))),
				"accepted {bogus:?}"
			);
		}
	}

	#[test]
	fn rejects_unknown_ciphers() {
		test_init();
		let result =
			SecretKey::parse("secret.key:///BassOmatic;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8");

		assert!(matches!(result, Err(Error::UnknownCipher(_))));
	}

	#[test]
	fn respects_the_registry_it_is_given() {
		test_init();
		let mut registry = Registry::empty();
		registry.register(Cipher::XChaCha20Poly1305);

		assert!(matches!(
			SecretKey::parse_with(KNOWN_URI, &registry),
			Err(Error::UnknownCipher(_))
		));
	}

	#[test]
	fn rejects_wrong_key_lengths() {
		test_init();
		// 31 bytes
		let result =
			SecretKey::parse("secret.key:///xsalsa20poly1305;AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHg");
		assert!(matches!(result, Err(Error::InvalidArgument(_))));

		assert!(matches!(
			SecretKey::new(Cipher::Aes256CbcHmacSha256, vec![0u8; 32]),
			Err(Error::InvalidArgument(_))
		));
	}

	#[test]
	fn aes128cbchmacsha256128_keys_are_64_bytes() {
		test_init();
		let bytes: Vec<u8> = (0u8..64).collect();
		let uri = format!(
			"secret.key:///aes128cbchmacsha256128;{}",
			KEY_ENCODING.encode(&bytes)
		);

		let key = SecretKey::parse(&uri).unwrap();
		assert_eq!(Cipher::Aes128CbcHmacSha256128, key.cipher());
		assert_eq!(bytes, key.expose_secret());
		assert_eq!(uri, key.to_uri().expose_secret());

		assert!(matches!(
			SecretKey::new(Cipher::Aes128CbcHmacSha256128, vec![0u8; 32]),
			Err(Error::InvalidArgument(_))
		));
	}

	#[test]
	fn encrypts_and_decrypts() {
		test_init();
		let key = SecretKey::random(Cipher::Aes128CbcHmacSha256128);

		let ciphertext = key.encrypt("THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE").unwrap();
		assert_eq!(
			b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE".to_vec(),
			key.decrypt(&ciphertext).unwrap()
		);

		let other = SecretKey::random(Cipher::Aes128CbcHmacSha256128);
		assert!(matches!(
			other.decrypt(&ciphertext),
			Err(Error::CorruptedMessage(_))
		));
	}
}
