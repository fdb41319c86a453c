use super::{
	Envelope, Error, Fingerprint, Keyring, KeyringEntry, Registry, SecretKey,
	envelope::header::{CIPHER, KEY_FINGERPRINT},
};

/// Authenticated symmetric encryption, with support for key rotation.
///
/// A [`SymmetricEncryption`] encrypts everything with its *active* key, and wraps the ciphertext in
/// an [`Envelope`] that records which cipher and which key (by [`Fingerprint`]) were used.  When
/// decrypting, it finds the key named in the envelope on its [`Keyring`], which always contains
/// the active key, as well as any older keys you care to give it.
///
/// To rotate keys, generate a new key, make it the active key, and put the old key on the keyring.
/// Old messages will keep decrypting, and [`SymmetricEncryption::rotate`] will re-encrypt them
/// under the new key, at which point the old key can be retired.
///
/// # Example
///
/// ```rust
/// use cryptor::{Cipher, Error, SecretKey, SymmetricEncryption};
/// # fn main() -> Result<(), Error> {
///
/// let old_key = SecretKey::random(Cipher::XSalsa20Poly1305);
/// let new_key = SecretKey::random(Cipher::Aes256CbcHmacSha256);
///
/// let old_cryptor = SymmetricEncryption::new(old_key.clone());
/// let message = old_cryptor.encrypt("THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE")?;
///
/// // Only knows about the new key
/// let new_cryptor = SymmetricEncryption::new(new_key.clone());
/// assert!(matches!(new_cryptor.decrypt(&message), Err(Error::KeyNotFound(_))));
///
/// // Encrypts with the new key, but still has the old one on hand
/// let hybrid_cryptor = SymmetricEncryption::with_keys(new_key, [old_key])?;
/// assert_eq!(
///     b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE".to_vec(),
///     hybrid_cryptor.decrypt(&message)?
/// );
///
/// // Re-encrypt under the new key, and the old key is no longer needed
/// let rotated = hybrid_cryptor.rotate(&message)?;
/// assert_eq!(
///     b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE".to_vec(),
///     new_cryptor.decrypt(&rotated)?
/// );
///
/// // Rotating again doesn't change anything
/// assert_eq!(rotated, hybrid_cryptor.rotate(&rotated)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SymmetricEncryption {
	active_key: SecretKey,
	active_fingerprint: Fingerprint,
	keyring: Keyring,
}

impl SymmetricEncryption {
	/// Generate a random key for the cipher called `algorithm`.
	///
	/// # Errors
	///
	/// [`Error::UnknownCipher`] if there's no such cipher in the [global
	/// registry](Registry::global).
	pub fn random_key(algorithm: &str) -> Result<SecretKey, Error> {
		Ok(Registry::global().lookup(algorithm)?.random_key())
	}

	/// Encrypt and decrypt with `active_key` alone.
	pub fn new(active_key: SecretKey) -> Self {
		Self::with_keyring(active_key, Keyring::default())
	}

	/// Encrypt with `active_key`, and decrypt with it or any of `keys`, which may be
	/// [`SecretKey`]s or key URIs.
	///
	/// # Errors
	///
	/// Anything [`SecretKey::parse`] can return, if one of the URIs is no good.
	pub fn with_keys(
		active_key: SecretKey,
		keys: impl IntoIterator<Item = impl Into<KeyringEntry>>,
	) -> Result<Self, Error> {
		Ok(Self::with_keyring(active_key, Keyring::from_entries(keys)?))
	}

	/// Encrypt with `active_key`, and decrypt with it or anything on `keyring`.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn with_keyring(active_key: SecretKey, mut keyring: Keyring) -> Self {
		// The active key goes on last, so nothing on the keyring can shadow it
		keyring.insert(active_key.clone());

		let active_fingerprint = active_key.fingerprint();
		tracing::debug!(fingerprint=%active_fingerprint, "Active key");

		Self {
			active_key,
			active_fingerprint,
			keyring,
		}
	}

	pub fn active_key(&self) -> &SecretKey {
		&self.active_key
	}

	pub fn keyring(&self) -> &Keyring {
		&self.keyring
	}

	/// Encrypt `plaintext` under the active key, and return the message envelope.
	///
	/// # Errors
	///
	/// [`Error::Encryption`] in the (extremely unlikely) event the cipher fails.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn encrypt(&self, plaintext: impl AsRef<[u8]>) -> Result<String, Error> {
		let ciphertext = self.active_key.encrypt(plaintext)?;
		tracing::debug!(fingerprint=%self.active_fingerprint, "Encrypting");

		Ok(Envelope::seal(&ciphertext, self.active_key.cipher(), &self.active_fingerprint).to_string())
	}

	/// Decrypt a message, with whichever key on the keyring it was encrypted with.
	///
	/// # Errors
	///
	/// * [`Error::InvalidMessage`] if `message` isn't a message envelope, or doesn't say which
	///   key it was encrypted with.
	/// * [`Error::KeyNotFound`] if the key it was encrypted with isn't on the keyring.
	/// * [`Error::CorruptedMessage`] if the ciphertext fails authentication.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn decrypt(&self, message: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
		let envelope = Envelope::parse(message)?;
		let key = self.resolve(&envelope)?;

		Self::open(key, &envelope)
	}

	/// Re-encrypt a message under the active key, if it isn't already.
	///
	/// A message that is already encrypted under the active key is returned untouched, so this
	/// is safe to run over everything you have, as many times as you like.
	///
	/// # Errors
	///
	/// As for [`SymmetricEncryption::decrypt`].
	pub fn rotate(&self, message: impl AsRef<str>) -> Result<String, Error> {
		match self.rotate_strict(message.as_ref()) {
			Err(Error::AlreadyRotated(_)) => Ok(message.as_ref().to_string()),
			other => other,
		}
	}

	/// Re-encrypt a message under the active key, complaining if there's nothing to do.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRotated`] if the message is already encrypted under the active key, or any
	/// error [`SymmetricEncryption::decrypt`] can return.
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn rotate_strict(&self, message: impl AsRef<str>) -> Result<String, Error> {
		let envelope = Envelope::parse(message.as_ref())?;
		let key = self.resolve(&envelope)?;

		let fingerprint = key.fingerprint();
		if fingerprint == self.active_fingerprint {
			tracing::debug!(%fingerprint, "Already under the active key");
			return Err(Error::already_rotated(fingerprint.to_string()));
		}

		tracing::debug!(from=%fingerprint, to=%self.active_fingerprint, "Rotating");
		self.encrypt(Self::open(key, &envelope)?)
	}

	fn resolve(&self, envelope: &Envelope) -> Result<&SecretKey, Error> {
		let Some(fingerprint) = envelope.header(KEY_FINGERPRINT) else {
			return Err(Error::invalid_message("no key fingerprint"));
		};

		self.keyring.resolve(fingerprint)
	}

	fn open(key: &SecretKey, envelope: &Envelope) -> Result<Vec<u8>, Error> {
		// The header isn't authenticated, so it can only ever agree with the key
		if let Some(algorithm) = envelope.header(CIPHER) {
			if algorithm != key.cipher().algorithm() {
				tracing::debug!(
					algorithm,
					expected = key.cipher().algorithm(),
					"Cipher does not match key"
				);
				return Err(Error::corrupted_message(format!(
					"message cipher {algorithm} does not match key cipher {}",
					key.cipher()
				)));
			}
		}

		key.decrypt(envelope.decoded_body()?)
	}
}
