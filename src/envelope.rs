use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::{fmt, str::FromStr};

use super::{Cipher, Error, Fingerprint};

/// Names of the headers this crate reads and writes.
pub mod header {
	pub const CIPHER: &str = "Cipher";
	pub const CONTENT_LENGTH: &str = "Content-Length";
	pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
	pub const KEY_FINGERPRINT: &str = "Key-Fingerprint";
}

use header::{CIPHER, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING, KEY_FINGERPRINT};

const BEGIN: &[u8] = b"-----BEGIN CRYPTOR MESSAGE-----\n";
const END: &[u8] = b"-----END CRYPTOR MESSAGE-----";

/// How the body of an [`Envelope`] is represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEncoding {
	Base64,
	Binary,
}

impl TransferEncoding {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Base64 => "base64",
			Self::Binary => "binary",
		}
	}
}

impl fmt::Display for TransferEncoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TransferEncoding {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		match s {
			"base64" => Ok(Self::Base64),
			"binary" => Ok(Self::Binary),
			other => Err(Error::invalid_argument(format!(
				"invalid message encoding: {other}"
			))),
		}
	}
}

/// A body, and the headers that describe it.
///
/// This is the framing that every encrypted message travels in.  It looks like this:
///
/// ```text
/// -----BEGIN CRYPTOR MESSAGE-----
/// Cipher: xsalsa20poly1305
/// Content-Length: 104
/// Content-Transfer-Encoding: base64
/// Key-Fingerprint: ni:///sha-256;zgqOwsEEzPrNd_nMoJOow1yC7j5SrbWXcYYIbWS6Rc8
///
/// <body>
/// -----END CRYPTOR MESSAGE-----
/// ```
///
/// Headers are `Name: value` lines, kept in order, and are looked up case-insensitively.
/// `Content-Length` is the length in bytes of the body *as written*, and is what delimits the body,
/// so a `binary` body may contain any bytes at all.  Envelopes built by this crate always use
/// `base64`, and so are plain ASCII.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
	headers: Vec<(String, String)>,
	body: Vec<u8>,
}

impl Envelope {
	/// Build an envelope around an already-encoded `body`.
	///
	/// `Content-Length` is always set from the body, whatever `headers` says.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] if a header name or value can't be represented.
	pub fn new<N: Into<String>, V: Into<String>>(
		body: impl Into<Vec<u8>>,
		headers: impl IntoIterator<Item = (N, V)>,
	) -> Result<Self, Error> {
		let mut envelope = Self {
			headers: Vec::new(),
			body: body.into(),
		};

		for (name, value) in headers {
			let (name, value) = (name.into(), value.into());

			if !is_valid_name(&name) {
				return Err(Error::invalid_argument(format!("invalid header name: {name:?}")));
			}
			if value.contains(['\r', '\n']) {
				return Err(Error::invalid_argument(format!(
					"invalid value for header {name}"
				)));
			}

			envelope.set_header(name, value);
		}

		envelope.set_header(CONTENT_LENGTH, envelope.body.len().to_string());

		Ok(envelope)
	}

	/// Build an envelope that carries `raw_body` in base64.
	///
	/// # Errors
	///
	/// As for [`Envelope::new`].
	pub fn encode<N: Into<String>, V: Into<String>>(
		raw_body: &[u8],
		headers: impl IntoIterator<Item = (N, V)>,
	) -> Result<Self, Error> {
		let mut envelope = Self::new(STANDARD.encode(raw_body), headers)?;
		envelope.set_header(CONTENT_TRANSFER_ENCODING, TransferEncoding::Base64.as_str());

		Ok(envelope)
	}

	/// The envelope for a ciphertext produced by `cipher` under the key with `fingerprint`.
	pub fn seal(ciphertext: &[u8], cipher: Cipher, fingerprint: &Fingerprint) -> Self {
		let body = STANDARD.encode(ciphertext).into_bytes();

		Self {
			headers: vec![
				(CIPHER.to_string(), cipher.algorithm().to_string()),
				(CONTENT_LENGTH.to_string(), body.len().to_string()),
				(
					CONTENT_TRANSFER_ENCODING.to_string(),
					TransferEncoding::Base64.as_str().to_string(),
				),
				(KEY_FINGERPRINT.to_string(), fingerprint.to_string()),
			],
			body,
		}
	}

	/// Read an envelope.
	///
	/// # Errors
	///
	/// [`Error::InvalidMessage`] if `input` isn't a well-formed envelope, including when it is
	/// missing a `Content-Length`, or has a `Content-Transfer-Encoding` other than `base64` or
	/// `binary`.
	#[tracing::instrument(level = "trace", skip_all)]
	pub fn parse(input: impl AsRef<[u8]>) -> Result<Self, Error> {
		let Some(mut rest) = input.as_ref().strip_prefix(BEGIN) else {
			return Err(Error::invalid_message("missing message header"));
		};

		let mut headers: Vec<(String, String)> = Vec::new();

		loop {
			let Some(eol) = rest.iter().position(|&b| b == b'\n') else {
				return Err(Error::invalid_message("unterminated header block"));
			};
			let line = &rest[..eol];
			rest = &rest[eol + 1..];

			if line.is_empty() {
				break;
			}

			let line = std::str::from_utf8(line)
				.map_err(|_| Error::invalid_message("header is not valid UTF-8"))?;
			let Some((name, value)) = line.split_once(": ") else {
				return Err(Error::invalid_message(format!("malformed header: {line:?}")));
			};

			if !is_valid_name(name) {
				return Err(Error::invalid_message(format!("invalid header name: {name:?}")));
			}
			if headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
				return Err(Error::invalid_message(format!("duplicate header: {name}")));
			}

			headers.push((name.to_string(), value.to_string()));
		}

		let mut envelope = Self {
			headers,
			body: Vec::new(),
		};

		let Some(length) = envelope.header(CONTENT_LENGTH) else {
			return Err(Error::invalid_message("missing Content-Length"));
		};
		if length.is_empty() || !length.bytes().all(|b| b.is_ascii_digit()) {
			return Err(Error::invalid_message(format!(
				"invalid Content-Length: {length:?}"
			)));
		}
		let length: usize = length
			.parse()
			.map_err(|_| Error::invalid_message("Content-Length out of range"))?;

		if rest.len() < length {
			return Err(Error::invalid_message("body shorter than Content-Length"));
		}
		let (body, trailer) = rest.split_at(length);

		let footer = trailer
			.strip_prefix(b"\n")
			.and_then(|t| t.strip_prefix(END))
			.filter(|t| t.is_empty() || *t == b"\n");
		if footer.is_none() {
			return Err(Error::invalid_message("missing message footer"));
		}

		if let Some(encoding) = envelope.header(CONTENT_TRANSFER_ENCODING) {
			encoding
				.parse::<TransferEncoding>()
				.map_err(|e| Error::invalid_message(e.to_string()))?;
		}

		envelope.body = body.to_vec();

		Ok(envelope)
	}

	/// The value of the first header called `name` (ignoring case), if there is one.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}

	pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
		self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
	}

	/// The body, exactly as it is written in the envelope.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// How the body is encoded.  An envelope with no `Content-Transfer-Encoding` is `binary`.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] if the header holds anything else.
	pub fn transfer_encoding(&self) -> Result<TransferEncoding, Error> {
		self.header(CONTENT_TRANSFER_ENCODING)
			.map_or(Ok(TransferEncoding::Binary), str::parse)
	}

	/// The body, with its transfer encoding removed.
	///
	/// # Errors
	///
	/// [`Error::InvalidArgument`] if the transfer encoding isn't one we understand, or
	/// [`Error::InvalidMessage`] if a `base64` body isn't valid base64.
	pub fn decoded_body(&self) -> Result<Vec<u8>, Error> {
		match self.transfer_encoding()? {
			TransferEncoding::Base64 => STANDARD
				.decode(&self.body)
				.map_err(|_| Error::invalid_message("body is not valid base64")),
			TransferEncoding::Binary => Ok(self.body.clone()),
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut v = BEGIN.to_vec();

		for (name, value) in &self.headers {
			v.extend_from_slice(name.as_bytes());
			v.extend_from_slice(b": ");
			v.extend_from_slice(value.as_bytes());
			v.push(b'\n');
		}

		v.push(b'\n');
		v.extend_from_slice(&self.body);
		v.push(b'\n');
		v.extend_from_slice(END);
		v.push(b'\n');

		v
	}

	fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let (name, value) = (name.into(), value.into());

		if let Some(entry) = self
			.headers
			.iter_mut()
			.find(|(n, _)| n.eq_ignore_ascii_case(&name))
		{
			entry.1 = value;
		} else {
			self.headers.push((name, value));
		}
	}
}

/// The text form of the envelope.
///
/// A `binary` body that isn't valid UTF-8 can't be written as text, so it is written base64
/// encoded instead, with `Content-Length` and `Content-Transfer-Encoding` to match.  The result
/// still parses back to the same decoded body.  [`Envelope::to_bytes`] gives the exact bytes.
impl fmt::Display for Envelope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let bytes = match self.transfer_encoding() {
			Ok(TransferEncoding::Binary) if std::str::from_utf8(&self.body).is_err() => {
				let mut text = self.clone();
				text.body = STANDARD.encode(&self.body).into_bytes();
				text.set_header(CONTENT_LENGTH, text.body.len().to_string());
				text.set_header(CONTENT_TRANSFER_ENCODING, TransferEncoding::Base64.as_str());
				text.to_bytes()
			}
			_ => self.to_bytes(),
		};

		f.write_str(&String::from_utf8_lossy(&bytes))
	}
}

fn is_valid_name(name: &str) -> bool {
	!name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_init;

	const GARBAGE: &str = "Timely and accurate information about the activities, capabilities, \
		plans, and intentions of foreign powers, organizations, and persons \
		and their agents, is essential to the national security of the \
		United States.";

	fn sample() -> Envelope {
		Envelope::encode(
			b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE",
			[("Cipher", "xsalsa20poly1305"), ("Key-Fingerprint", "ni:///sha-256;abc")],
		)
		.unwrap()
	}

	#[test]
	fn encodes_and_parses() {
		test_init();
		let envelope = sample();
		let parsed = Envelope::parse(envelope.to_string()).unwrap();

		assert_eq!(envelope, parsed);
		assert_eq!(
			b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE".to_vec(),
			parsed.decoded_body().unwrap()
		);
		assert_eq!(Some("ni:///sha-256;abc"), parsed.header("key-fingerprint"));
		assert_eq!(TransferEncoding::Base64, parsed.transfer_encoding().unwrap());
	}

	#[test]
	fn content_length_is_the_encoded_length() {
		test_init();
		let envelope = sample();

		let encoded = STANDARD.encode(b"THE MAGIC WORDS ARE SQUEAMISH OSSIFRAGE");
		assert_eq!(encoded.as_bytes(), envelope.body());
		assert_eq!(
			Some(encoded.len().to_string().as_str()),
			envelope.header(CONTENT_LENGTH)
		);
	}

	#[test]
	fn keeps_header_order() {
		test_init();
		let names: Vec<_> = sample().headers().map(|(n, _)| n.to_string()).collect();

		assert_eq!(
			vec![
				"Cipher",
				"Key-Fingerprint",
				"Content-Length",
				"Content-Transfer-Encoding"
			],
			names
		);
	}

	#[test]
	fn wire_format() {
		test_init();
		let envelope = Envelope::new("aGk=", [(CONTENT_TRANSFER_ENCODING, "base64")]).unwrap();

		assert_eq!(
			"-----BEGIN CRYPTOR MESSAGE-----\n\
			 Content-Transfer-Encoding: base64\n\
			 Content-Length: 4\n\
			 \n\
			 aGk=\n\
			 -----END CRYPTOR MESSAGE-----\n",
			envelope.to_string()
		);
	}

	#[test]
	fn binary_bodies() {
		test_init();
		let body = b"\x00\xff\n-----END CRYPTOR MESSAGE-----\n\n".to_vec();
		let envelope = Envelope::new(body.clone(), [(CONTENT_TRANSFER_ENCODING, "binary")]).unwrap();

		let parsed = Envelope::parse(envelope.to_bytes()).unwrap();
		assert_eq!(body, parsed.decoded_body().unwrap());

		// No encoding header at all means binary
		let bare = Envelope::new(body.clone(), Vec::<(String, String)>::new()).unwrap();
		assert_eq!(TransferEncoding::Binary, bare.transfer_encoding().unwrap());
		assert_eq!(body, bare.decoded_body().unwrap());
	}

	#[test]
	fn binary_bodies_survive_being_displayed() {
		test_init();
		let body = vec![0xff, 0xfe, 0x00, 0x01, 0x80];
		let envelope = Envelope::new(body.clone(), [(CONTENT_TRANSFER_ENCODING, "binary")]).unwrap();

		let text = envelope.to_string();
		let parsed = Envelope::parse(&text).unwrap();
		assert_eq!(TransferEncoding::Base64, parsed.transfer_encoding().unwrap());
		assert_eq!(body, parsed.decoded_body().unwrap());

		// Nothing is re-encoded in the byte form
		let parsed = Envelope::parse(envelope.to_bytes()).unwrap();
		assert_eq!(envelope, parsed);

		// Binary bodies that are already text are left alone
		let envelope = Envelope::new("plain text", [(CONTENT_TRANSFER_ENCODING, "binary")]).unwrap();
		assert_eq!(envelope, Envelope::parse(envelope.to_string()).unwrap());
	}

	#[test]
	fn garbage_is_invalid() {
		test_init();
		assert!(matches!(
			Envelope::parse(GARBAGE),
			Err(Error::InvalidMessage(_))
		));
		assert!(matches!(Envelope::parse(""), Err(Error::InvalidMessage(_))));
	}

	#[test]
	fn structural_damage_is_invalid() {
		test_init();
		let good = sample().to_string();

		let damaged = [
			// No Content-Length
			good.replace("Content-Length: ", "Content-Width: "),
			// Unparseable lengths
			good.replace("Content-Length: ", "Content-Length: +"),
			good.replace("Content-Length: ", "Content-Length: x"),
			good.replace("Content-Length: ", "Content-Length: 99999999999999999999999"),
			// Body shorter than advertised
			good.replace("Content-Length: 52", "Content-Length: 520"),
			// Body longer than advertised
			good.replace("Content-Length: 52", "Content-Length: 51"),
			// Unknown encoding
			good.replace("base64", "rot13"),
			// Header without a separator
			good.replace("Cipher: ", "Cipher="),
			// Duplicate header
			good.replace("Cipher: xsalsa20poly1305", "Cipher: a\nCipher: b"),
			// Truncation
			good[..good.len() - 10].to_string(),
			// Trailing junk
			format!("{good}more"),
			// No header block terminator
			"-----BEGIN CRYPTOR MESSAGE-----\nCipher: x".to_string(),
		];

		for message in damaged {
			assert!(
				matches!(Envelope::parse(&message), Err(Error::InvalidMessage(_))),
				"accepted {message:?}"
			);
		}
	}

	#[test]
	fn missing_final_newline_is_ok() {
		test_init();
		let good = sample().to_string();

		assert_eq!(sample(), Envelope::parse(good.trim_end()).unwrap());
	}

	#[test]
	fn unknown_encodings_cannot_be_decoded() {
		test_init();
		let envelope = Envelope::new("aGk=", [(CONTENT_TRANSFER_ENCODING, "rot13")]).unwrap();

		assert!(matches!(
			envelope.decoded_body(),
			Err(Error::InvalidArgument(_))
		));
	}

	#[test]
	fn bad_base64_bodies() {
		test_init();
		let envelope = Envelope::new("not base64!", [(CONTENT_TRANSFER_ENCODING, "base64")]).unwrap();
		let parsed = Envelope::parse(envelope.to_bytes()).unwrap();

		assert!(matches!(parsed.decoded_body(), Err(Error::InvalidMessage(_))));
	}

	#[test]
	fn unrepresentable_headers() {
		test_init();
		for (name, value) in [("", "x"), ("Bad Name", "x"), ("Bad:Name", "x"), ("Name", "a\nb")] {
			assert!(
				matches!(
					Envelope::new("", [(name, value)]),
					Err(Error::InvalidArgument(_))
				),
				"accepted {name:?}: {value:?}"
			);
		}
	}

	#[test]
	fn content_length_cannot_be_forged() {
		test_init();
		let envelope = Envelope::new("abc", [(CONTENT_LENGTH, "1000")]).unwrap();

		assert_eq!(Some("3"), envelope.header(CONTENT_LENGTH));
		assert_eq!(1, envelope.headers().count());
	}
}
