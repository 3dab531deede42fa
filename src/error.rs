//! Library-specific error types.

/// Errors surfaced by the bridge public API and by host callbacks.
///
/// Host-function errors do not normally appear here: they round-trip
/// through the guest's two-slot `(value, ok-flag)` convention and are
/// re-raised on the guest side. The variants below cover configuration,
/// lifecycle and protocol failures on the host side.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A bridge with the same name already exists in this process.
	#[error("bridge name {0:?} is already in use")]
	DuplicateName(String),

	/// The engine rejected the module, instantiation failed, or a guest
	/// call trapped.
	#[error("WebAssembly failure: {0}")]
	Wasm(String),

	/// The module does not provide an export the runtime depends on.
	#[error("module is missing required export {0:?}")]
	MissingExport(&'static str),

	/// `call_func` did not find the named property on the global object.
	#[error("no function {0:?} registered on the global object")]
	NoSuchFunction(String),

	/// The named property exists but is not callable the way it was used
	/// (e.g. `call_func` on a host function, or `valueCall` on a plain
	/// property).
	#[error("{0:?} is not callable")]
	NotAFunction(String),

	/// The guest asked for a property the host object does not carry.
	#[error("missing property {0:?}")]
	MissingProperty(String),

	/// The guest runtime has exited; no further calls are possible.
	#[error("wasm instance already exited with code {0}")]
	AlreadyExited(i32),

	/// The host cancelled the bridge; the in-flight guest call was
	/// aborted and no further calls are possible.
	#[error("bridge cancelled by the host")]
	Cancelled,

	/// A guest invocation failed.
	#[error("guest call failure: {0}")]
	GuestCall(String),

	/// A value had the wrong shape for the requested operation.
	#[error("expected {expected}, got {actual}")]
	Type {
		expected: &'static str,
		actual: &'static str,
	},

	/// A guest-supplied address or slice header points outside linear
	/// memory.
	#[error("memory access out of bounds at {addr}+{len}")]
	OutOfBounds { addr: usize, len: usize },

	/// An index into an array or byte buffer was out of range.
	#[error("index {index} out of range for length {len}")]
	Index { index: usize, len: usize },

	/// A slot referenced a value-table id that was never handed out.
	#[error("unknown value reference {0}")]
	BadRef(u32),

	/// The guest passed bytes that are not valid UTF-8 where a string was
	/// expected.
	#[error("invalid utf-8 in guest memory: {0}")]
	Utf8(#[from] std::str::Utf8Error),

	/// The guest used a part of the host ABI this runtime deliberately
	/// does not provide (timers, `fetch`, `valueSetIndex`).
	#[error("not supported: {0}")]
	Unsupported(&'static str),

	/// A host I/O operation failed.
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	pub(crate) fn wasm(e: impl std::fmt::Display) -> Self {
		Error::Wasm(e.to_string())
	}
}

/// A result type for errors that occur within this library.
pub type Result<T> = std::result::Result<T, Error>;
