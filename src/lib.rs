//! Authenticated symmetric encryption, with pluggable ciphers and painless key rotation.
//!
//! If you want to encrypt something that only someone with the same key can decrypt, and you'd
//! like to be able to change that key now and then without losing access to everything you
//! encrypted with the old one, then cryptor is for you.
//!
//! A [`SymmetricEncryption`] encrypts everything with a single *active* [`SecretKey`], and wraps
//! each ciphertext in a text [`Envelope`] that says which [`Cipher`] was used, and which key (by
//! its [`Fingerprint`]).  It can decrypt anything encrypted by any key on its [`Keyring`].
//!
//! Key rotation is therefore a matter of generating a new key, making it the active key, and
//! putting the old key on the keyring.  Every existing message keeps working, and
//! [`SymmetricEncryption::rotate`] will re-encrypt them under the new key when you get around to
//! it.  Once nothing is left under the old key, throw it away.
//!
//! # Keys
//!
//! A [`SecretKey`] knows which cipher it is for, and can be written down as a URI such as
//! `secret.key:///xsalsa20poly1305;<base64url key material>`, suitable for keeping in
//! configuration or a secrets manager.  The fingerprint of a key is derived from that URI, and
//! is safe to log or store alongside the data it protects.
//!
//! # Ciphers
//!
//! All ciphers are AEADs, or built up into one:
//!
//! * `aes256cbchmacsha256`: AES-256 in CBC mode, with an HMAC-SHA-256 over the result
//!   (encrypt-then-MAC); 64 byte keys.
//! * `aes128cbchmacsha256128`: the same construction as `aes256cbchmacsha256` (yes, really),
//!   kept under its historical name; 64 byte keys.
//! * `xsalsa20poly1305`: the NaCl "secretbox" construction; 32 byte keys.
//! * `xchacha20poly1305`: XChaCha20-Poly1305; 32 byte keys.
//!
//! Ciphers are found by name through a [`Registry`].
//!
//! # Example
//!
//! ```rust
//! use cryptor::{Error, SymmetricEncryption};
//! # fn main() -> Result<(), Error> {
//!
//! let key = SymmetricEncryption::random_key("xchacha20poly1305")?;
//! let cryptor = SymmetricEncryption::new(key);
//!
//! let message = cryptor.encrypt(b"SUPER SEKRIT")?;
//! assert!(message.starts_with("-----BEGIN CRYPTOR MESSAGE-----\n"));
//! assert_eq!(b"SUPER SEKRIT".to_vec(), cryptor.decrypt(&message)?);
//! # Ok(())
//! # }
//! ```
mod cbc_hmac;
mod cipher;
mod envelope;
mod error;
mod fingerprint;
mod keyring;
mod registry;
mod secret_box;
mod secret_key;
mod symmetric_encryption;

pub use ::secrecy;

pub use cipher::Cipher;
pub use envelope::{Envelope, TransferEncoding, header};
pub use error::Error;
pub use fingerprint::Fingerprint;
pub use keyring::{Keyring, KeyringEntry};
pub use registry::Registry;
pub use secret_key::SecretKey;
pub use symmetric_encryption::SymmetricEncryption;

#[cfg(test)]
pub(crate) fn test_init() {
	use std::sync::Once;
	use tracing_subscriber::{Registry as SubscriberRegistry, layer::SubscriberExt as _};

	static INIT: Once = Once::new();

	INIT.call_once(|| {
		let layer = tracing_tree::HierarchicalLayer::default()
			.with_writer(tracing_subscriber::fmt::TestWriter::new())
			.with_indent_lines(true)
			.with_indent_amount(2)
			.with_targets(true);

		let sub = SubscriberRegistry::default().with(layer);
		tracing::subscriber::set_global_default(sub).unwrap();
	});
}
