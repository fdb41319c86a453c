#[derive(Debug, thiserror::Error, thiserror_ext::Construct)]
#[non_exhaustive]
pub enum Error {
	#[error("no such cipher: {0}")]
	UnknownCipher(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("invalid message: {0}")]
	InvalidMessage(String),

	#[error("corrupted message: {0}")]
	CorruptedMessage(String),

	#[error("no key for fingerprint: {0}")]
	KeyNotFound(String),

	#[error("message is already encrypted under the active key ({0})")]
	AlreadyRotated(String),

	#[error("failed to encrypt plaintext")]
	Encryption,
}
