use secrecy::{ExposeSecret as _, SecretString};
use std::collections::HashMap;

use super::{Error, Fingerprint, Registry, SecretKey};

/// Something that can be put on a [`Keyring`]: either a key, or its canonical URI.
///
/// A URI carries the key material, so it is held as a [`SecretString`] and redacted from the
/// [`Debug`](std::fmt::Debug) output.
#[derive(Debug)]
pub enum KeyringEntry {
	Key(SecretKey),
	Uri(SecretString),
}

impl From<SecretKey> for KeyringEntry {
	fn from(key: SecretKey) -> Self {
		Self::Key(key)
	}
}

impl From<&SecretKey> for KeyringEntry {
	fn from(key: &SecretKey) -> Self {
		Self::Key(key.clone())
	}
}

impl From<SecretString> for KeyringEntry {
	fn from(uri: SecretString) -> Self {
		Self::Uri(uri)
	}
}

impl From<String> for KeyringEntry {
	fn from(uri: String) -> Self {
		Self::Uri(uri.into())
	}
}

impl From<&str> for KeyringEntry {
	fn from(uri: &str) -> Self {
		Self::Uri(uri.into())
	}
}

/// A set of [`SecretKey`]s, indexed by their [`Fingerprint`]s.
///
/// Every encrypted message records the fingerprint of the key it was encrypted with, so a keyring
/// that holds the current key *and* the keys that were current in the past can decrypt anything
/// that any of them encrypted.
///
/// The index is always computed from the keys themselves; there is no way to file a key under
/// somebody else's fingerprint.  Adding two keys with the same fingerprint (which means they are
/// the same key, barring a SHA-256 collision) keeps whichever was added last.
#[derive(Clone, Debug, Default)]
pub struct Keyring {
	keys: HashMap<Fingerprint, SecretKey>,
}

impl Keyring {
	/// Create a keyring containing `keys`.
	#[tracing::instrument(level = "debug", skip(keys))]
	pub fn new(keys: impl IntoIterator<Item = SecretKey>) -> Self {
		let mut keyring = Self::default();

		for key in keys {
			keyring.insert(key);
		}

		keyring
	}

	/// Create a keyring from a mix of keys and key URIs, parsing the URIs with the [global
	/// registry](Registry::global).
	///
	/// # Errors
	///
	/// Anything [`SecretKey::parse`] can return, for the first URI that fails to parse.
	pub fn from_entries(
		entries: impl IntoIterator<Item = impl Into<KeyringEntry>>,
	) -> Result<Self, Error> {
		Self::from_entries_with(entries, Registry::global())
	}

	/// Create a keyring from a mix of keys and key URIs, parsing the URIs with `registry`.
	///
	/// # Errors
	///
	/// As for [`Keyring::from_entries`].
	#[tracing::instrument(level = "debug", skip_all)]
	pub fn from_entries_with(
		entries: impl IntoIterator<Item = impl Into<KeyringEntry>>,
		registry: &Registry,
	) -> Result<Self, Error> {
		let mut keyring = Self::default();

		for entry in entries {
			let key = match entry.into() {
				KeyringEntry::Key(key) => key,
				KeyringEntry::Uri(uri) => SecretKey::parse_with(uri.expose_secret(), registry)?,
			};
			keyring.insert(key);
		}

		Ok(keyring)
	}

	/// Create a keyring from key URIs.
	///
	/// # Errors
	///
	/// As for [`Keyring::from_entries`].
	pub fn from_uris(uris: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, Error> {
		Self::from_entries(uris.into_iter().map(|u| u.as_ref().to_string()))
	}

	/// Add `key` to the keyring, replacing any key with the same fingerprint.
	pub fn insert(&mut self, key: SecretKey) {
		let fingerprint = key.fingerprint();
		tracing::debug!(%fingerprint, algorithm = key.cipher().algorithm(), "Including key");

		if self.keys.insert(fingerprint, key).is_some() {
			tracing::debug!("Replaced existing key with the same fingerprint");
		}
	}

	/// Find the key with the given fingerprint.
	///
	/// # Errors
	///
	/// [`Error::KeyNotFound`] if there's no such key on the keyring.
	pub fn resolve(&self, fingerprint: &str) -> Result<&SecretKey, Error> {
		self.get(fingerprint).ok_or_else(|| {
			tracing::debug!(fingerprint, "Key not found");
			Error::key_not_found(fingerprint)
		})
	}

	/// The key with the given fingerprint, if it's on the keyring.
	pub fn get(&self, fingerprint: &str) -> Option<&SecretKey> {
		self.keys.get(fingerprint)
	}

	/// Whether the key with the given fingerprint is on the keyring.
	pub fn contains(&self, fingerprint: &str) -> bool {
		self.keys.contains_key(fingerprint)
	}

	/// The fingerprints of every key on the keyring, in no particular order.
	pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
		self.keys.keys()
	}

	/// How many distinct keys are on the keyring.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}
}
