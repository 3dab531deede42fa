//! # gojs
//!
//! The `gojs` crate is a WebAssembly host runtime for modules built with
//! Go's `js/wasm` target. That target expects a JavaScript host; `gojs`
//! impersonates one from native code. It instantiates the module on
//! wasmtime, provides the `go` import namespace the Go runtime requires,
//! exposes the small synthetic `global` object graph the runtime probes
//! at startup, and mediates calls in both directions: the guest can call
//! functions the host registers on the global object, and the host can
//! call functions the guest registers there.
//!
//! # Example
//! ```no_run
//! use gojs::Bridge;
//!
//! fn main() -> gojs::Result<()> {
//!     let mut bridge = Bridge::from_file("demo", "main.wasm")?;
//!
//!     // reachable from the guest as global.addProxy(...)
//!     bridge.set_func("addProxy", |guest, args| {
//!         guest.call_func("addition", args.to_vec())
//!     })?;
//!
//!     // starts the guest runtime; returns once its main has parked
//!     bridge.run()?;
//!
//!     // invoke a function the guest registered with js.Global().Set
//!     let res = bridge.call_func("multiplier", vec![])?;
//!     println!("multiplier() = {}", res.as_number()?);
//!     Ok(())
//! }
//! ```
//!
//! # Notes
//!
//! A bridge is single-threaded and cooperative, like the JavaScript host
//! it stands in for: the guest never runs concurrently with its own
//! callbacks, and host functions re-enter the guest on the same stack.
//! Different bridges are independent and may live on different threads.
//! The one cross-thread affordance is cancellation: a
//! [`CancelHandle`] (from [`Bridge::cancel_handle`]) aborts a guest that
//! never parks, and every call after a cancel fails immediately.
//!
//! Timers are not provided: the `runtime.scheduleTimeoutEvent` family of
//! imports traps. Guests must not rely on `time.Sleep` or scheduled
//! callbacks while parked.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use log::debug;
use wasmtime::{AsContextMut, Config, Engine, Linker, Module, Store, TypedFunc};

mod callbacks;
pub mod error;
mod event;
mod globals;
mod mem;
mod sys;
mod values;

pub use callbacks::BridgeState;
pub use error::{Error, Result};
pub use event::Guest;
pub use values::{Func, Object, Value};

use values::REF_GLOBAL;

pub(crate) const GO_NAMESPACE: &str = "go";

// -- Exports required of the guest module
pub(crate) const RUN_EXPORT: &str = "run";
pub(crate) const RESUME_EXPORT: &str = "resume";
pub(crate) const GETSP_EXPORT: &str = "getsp";
pub(crate) const MEM_EXPORT: &str = "mem";

fn bridge_names() -> &'static Mutex<HashSet<String>> {
	static NAMES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
	NAMES.get_or_init(|| Mutex::new(HashSet::new()))
}

fn claim_name(name: &str) -> Result<()> {
	let mut names = match bridge_names().lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	};
	if !names.insert(name.to_string()) {
		return Err(Error::DuplicateName(name.to_string()));
	}
	Ok(())
}

fn release_name(name: &str) {
	let mut names = match bridge_names().lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	};
	names.remove(name);
}

/// A thread-safe handle that cancels a bridge.
///
/// Obtained from [`Bridge::cancel_handle`] and usable from any thread:
/// [`CancelHandle::cancel`] interrupts guest code that is currently
/// executing (a `run` that never parks, a `call_func` that never
/// returns) and makes every later call on the bridge fail with
/// [`Error::Cancelled`].
#[derive(Clone)]
pub struct CancelHandle {
	engine: Engine,
	cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
		// bumping the epoch past the store deadline traps the guest at
		// its next loop or call boundary
		self.engine.increment_epoch();
	}
}

/// A running (or runnable) Go `js/wasm` instance and the state bridging
/// it to the host.
///
/// Exactly one owner drives the bridge; all calls take `&mut self` and
/// execute the guest cooperatively on the calling thread. Cancellation
/// is the one cross-thread affordance, via [`Bridge::cancel_handle`].
pub struct Bridge {
	name: String,
	engine: Engine,
	store: Store<BridgeState>,
	run: TypedFunc<(i32, i32), ()>,
}

impl Bridge {
	/// Instantiates a bridge from raw module bytes (or WebAssembly text).
	///
	/// `name` identifies the bridge in logs and must be unique within
	/// the process; it is released again when the bridge is dropped.
	pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Bridge> {
		Bridge::from_bytes_with(name, bytes, |_| Ok(()))
	}

	/// Like [`Bridge::from_bytes`], reading the module from a file.
	pub fn from_file(name: &str, path: impl AsRef<Path>) -> Result<Bridge> {
		let bytes = std::fs::read(path)?;
		Bridge::from_bytes(name, &bytes)
	}

	/// Instantiates a bridge, giving the caller a chance to register
	/// additional imports on the linker before the module is linked.
	/// The `go` namespace is always provided by the runtime.
	pub fn from_bytes_with(
		name: &str,
		bytes: &[u8],
		imports: impl FnOnce(&mut Linker<BridgeState>) -> Result<()>,
	) -> Result<Bridge> {
		claim_name(name)?;
		let bridge = Bridge::instantiate(name, bytes, imports);
		if bridge.is_err() {
			release_name(name);
		}
		bridge
	}

	fn instantiate(
		name: &str,
		bytes: &[u8],
		imports: impl FnOnce(&mut Linker<BridgeState>) -> Result<()>,
	) -> Result<Bridge> {
		let mut config = Config::new();
		config.epoch_interruption(true);
		let engine = Engine::new(&config).map_err(Error::wasm)?;
		let module = Module::new(&engine, bytes).map_err(Error::wasm)?;
		let mut store = Store::new(&engine, BridgeState::new(name));
		// the epoch only ever moves on cancel, so the guest runs
		// undisturbed until a CancelHandle fires
		store.set_epoch_deadline(1);
		store.epoch_deadline_trap();

		let mut linker = Linker::new(&engine);
		callbacks::add_to_linker(&mut linker)?;
		imports(&mut linker)?;

		let instance = linker.instantiate(&mut store, &module).map_err(Error::wasm)?;
		let memory = instance
			.get_memory(&mut store, MEM_EXPORT)
			.ok_or(Error::MissingExport(MEM_EXPORT))?;
		let run = instance
			.get_typed_func::<(i32, i32), ()>(&mut store, RUN_EXPORT)
			.map_err(|_| Error::MissingExport(RUN_EXPORT))?;
		let resume = instance
			.get_typed_func::<(), ()>(&mut store, RESUME_EXPORT)
			.map_err(|_| Error::MissingExport(RESUME_EXPORT))?;
		let getsp = instance
			.get_typed_func::<(), i32>(&mut store, GETSP_EXPORT)
			.map_err(|_| Error::MissingExport(GETSP_EXPORT))?;

		let state = store.data_mut();
		state.memory = Some(memory);
		state.resume = Some(resume);
		state.getsp = Some(getsp);

		debug!("bridge {:?} instantiated ({} module bytes)", name, bytes.len());
		Ok(Bridge {
			name: name.to_string(),
			engine,
			store,
			run,
		})
	}

	/// Returns a handle that cancels this bridge from any thread.
	pub fn cancel_handle(&self) -> CancelHandle {
		CancelHandle {
			engine: self.engine.clone(),
			cancelled: self.store.data().cancelled.clone(),
		}
	}

	/// Starts the guest runtime by calling its exported `run(0, 0)`.
	///
	/// Returns once the guest's main function has parked (the usual
	/// shape: register functions, then block on a channel), exited, or
	/// been cancelled through a [`CancelHandle`]. After an exit,
	/// [`Bridge::exit_code`] carries the code and further calls fail; a
	/// trap raised on the way out of an exit is treated as normal
	/// shutdown.
	pub fn run(&mut self) -> Result<()> {
		debug!("bridge {:?} starting guest runtime", self.name);
		match self.run.call(&mut self.store, (0, 0)) {
			Ok(()) => Ok(()),
			Err(e) if self.store.data().exited => {
				debug!("bridge {:?} guest trapped after exit: {}", self.name, e);
				Ok(())
			}
			Err(_) if self.store.data().cancelled.load(Ordering::SeqCst) => {
				debug!("bridge {:?} cancelled", self.name);
				Err(Error::Cancelled)
			}
			Err(e) => Err(Error::GuestCall(e.to_string())),
		}
	}

	/// Invokes a function the guest registered on the global object
	/// (via `js.Global().Set(name, js.FuncOf(...))`).
	pub fn call_func(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
		Guest::new(self.store.as_context_mut()).call_func(name, args)
	}

	/// Installs a host function as `global.<name>`; the guest reaches it
	/// as `js.Global().Get(name)` / `js.Global().Call(name, ...)`.
	pub fn set_func(
		&mut self,
		name: &str,
		f: impl Fn(&mut Guest<'_>, &[Value]) -> Result<Value> + 'static,
	) -> Result<()> {
		let state = self.store.data_mut();
		if state.exited {
			return Err(Error::AlreadyExited(state.exit_code.unwrap_or(0)));
		}
		if state.cancelled.load(Ordering::SeqCst) {
			return Err(Error::Cancelled);
		}
		state
			.values
			.get(REF_GLOBAL)
			.cloned()
			.ok_or(Error::BadRef(REF_GLOBAL))?
			.set(name, Value::func(f))
	}

	/// The exit code recorded by `runtime.wasmExit`, if the guest exited.
	pub fn exit_code(&self) -> Option<i32> {
		self.store.data().exit_code
	}

	/// Whether the guest runtime has exited.
	pub fn exited(&self) -> bool {
		self.store.data().exited
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl Drop for Bridge {
	fn drop(&mut self) {
		release_name(&self.name);
	}
}
