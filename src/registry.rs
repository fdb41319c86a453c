use std::{collections::BTreeMap, sync::LazyLock};

use super::{Cipher, Error};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);

/// A table of the [`Cipher`]s that may be used, indexed by algorithm name.
///
/// The [`Default`] registry contains every cipher this crate supports.  If you want to restrict
/// which ciphers will be accepted when parsing keys (for example, to refuse keys for a cipher you
/// have retired), build your own registry with [`Registry::empty`] and [`Registry::register`], and
/// pass it to the `_with` variants of the parsing functions.
///
/// # Example
///
/// ```rust
/// use cryptor::{Cipher, Error, Registry};
///
/// let mut registry = Registry::empty();
/// registry.register(Cipher::XChaCha20Poly1305);
///
/// assert_eq!(Cipher::XChaCha20Poly1305, registry.lookup("xchacha20poly1305")?);
/// assert!(matches!(
///     registry.lookup("aes256cbchmacsha256"),
///     Err(Error::UnknownCipher(_))
/// ));
/// # Ok::<(), Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Registry {
	ciphers: BTreeMap<&'static str, Cipher>,
}

impl Registry {
	/// Create a registry with no ciphers in it at all.
	///
	/// For a registry with every supported cipher already registered, use
	/// [`Registry::default`].
	pub fn empty() -> Self {
		Self {
			ciphers: BTreeMap::new(),
		}
	}

	/// The process-wide registry of every supported cipher.
	///
	/// It is built the first time it is asked for, and is read-only thereafter, so it can be
	/// shared freely between threads.
	pub fn global() -> &'static Registry {
		&GLOBAL
	}

	/// Add a cipher to the registry.
	///
	/// The first registration of a given algorithm name wins; registering it again is a no-op.
	/// Returns whether the cipher was newly added.
	#[tracing::instrument(level = "trace", skip(self))]
	pub fn register(&mut self, cipher: Cipher) -> bool {
		if self.ciphers.contains_key(cipher.algorithm()) {
			tracing::trace!(algorithm = cipher.algorithm(), "Already registered");
			return false;
		}

		self.ciphers.insert(cipher.algorithm(), cipher);
		true
	}

	/// Find the cipher registered under `algorithm`.
	///
	/// # Errors
	///
	/// [`Error::UnknownCipher`] if nothing is registered by that name.
	pub fn lookup(&self, algorithm: &str) -> Result<Cipher, Error> {
		self.ciphers
			.get(algorithm)
			.copied()
			.ok_or_else(|| Error::unknown_cipher(algorithm))
	}

	/// Whether anything is registered under `algorithm`.
	pub fn contains(&self, algorithm: &str) -> bool {
		self.ciphers.contains_key(algorithm)
	}

	/// The names of all registered ciphers, in sorted order.
	pub fn algorithms(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.ciphers.keys().copied()
	}
}

impl Default for Registry {
	fn default() -> Self {
		let mut registry = Self::empty();

		for cipher in Cipher::ALL {
			registry.register(cipher);
		}

		registry
	}
}
