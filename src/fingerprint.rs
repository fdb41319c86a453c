use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest as _, Sha256};
use std::{borrow::Borrow, str::FromStr};

use super::Error;

const PREFIX: &str = "ni:///sha-256;";
// 32 bytes of SHA-256, unpadded base64
const DIGEST_CHARS: usize = 43;

/// A stable, non-secret identifier for a [`SecretKey`](super::SecretKey).
///
/// This is a [RFC 6920](https://www.rfc-editor.org/rfc/rfc6920) "named information" URI
/// containing the SHA-256 hash of the key's canonical URI, such as
/// `ni:///sha-256;cS7UqLrlEbEQIqFpKahhmnEKJBFVUrBNKUw7NOBaWCM`.  It is written into every
/// encrypted message, so that the right key can be found to decrypt it again.
#[allow(clippy::derived_hash_with_manual_eq)] // f1 == f2 => hash(f1) == hash(f2) will hold
#[derive(Clone, Debug, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
	#[tracing::instrument(level = "trace", skip_all)]
	pub(crate) fn of(canonical: &[u8]) -> Self {
		let digest = Sha256::digest(canonical);

		Self(format!("{PREFIX}{}", URL_SAFE_NO_PAD.encode(digest)))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl PartialEq for Fingerprint {
	fn eq(&self, other: &Self) -> bool {
		constant_time_eq::constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
	}
}

impl Eq for Fingerprint {}

impl PartialEq<str> for Fingerprint {
	fn eq(&self, other: &str) -> bool {
		constant_time_eq::constant_time_eq(self.0.as_bytes(), other.as_bytes())
	}
}

impl PartialEq<&str> for Fingerprint {
	fn eq(&self, other: &&str) -> bool {
		self == *other
	}
}

impl AsRef<str> for Fingerprint {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for Fingerprint {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for Fingerprint {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		let Some(digest) = s.strip_prefix(PREFIX) else {
			return Err(Error::invalid_argument(format!(
				"not a SHA-256 fingerprint: {s}"
			)));
		};

		if digest.len() != DIGEST_CHARS || URL_SAFE_NO_PAD.decode(digest).is_err() {
			return Err(Error::invalid_argument(format!(
				"malformed fingerprint digest: {s}"
			)));
		}

		Ok(Self(s.to_string()))
	}
}
