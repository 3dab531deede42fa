//! The event pump: how the host invokes a guest-registered function.
//!
//! The guest runtime does not expose its functions as wasm exports.
//! Instead it mints opaque wrapper ids (`_makeFuncWrapper`) and expects
//! the host to install a pending-event record on the `jsGo` object and
//! re-enter the scheduler through the exported `resume`. The scheduler
//! reads `_pendingEvent`, runs the wrapped function, writes its result
//! back into the event record and returns.

use log::trace;
use std::sync::atomic::Ordering;
use wasmtime::StoreContextMut;

use crate::callbacks::BridgeState;
use crate::error::{Error, Result};
use crate::values::{Value, REF_GLOBAL, REF_GO};

/// A handle on the running guest, passed to every host function.
///
/// Host functions that need to call back into the guest do so through
/// this handle; the nested `resume` runs on the current host stack, so
/// guest → host → guest chains nest arbitrarily deep without any
/// coroutine machinery.
pub struct Guest<'a> {
	ctx: StoreContextMut<'a, BridgeState>,
}

impl<'a> Guest<'a> {
	pub(crate) fn new(ctx: StoreContextMut<'a, BridgeState>) -> Guest<'a> {
		Guest { ctx }
	}

	/// Invokes a function the guest registered on the global object.
	///
	/// The property must be a wrapper minted by the guest's
	/// `_makeFuncWrapper`; host functions installed via `set_func` are
	/// not callable this way.
	pub fn call_func(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
		let target = {
			let state = self.ctx.data();
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
				.get(name)
		};
		match target {
			Some(Value::FuncWrapper(id)) => self.call_guest(id, args),
			Some(_) => Err(Error::NotAFunction(name.to_string())),
			None => Err(Error::NoSuchFunction(name.to_string())),
		}
	}

	/// Dispatches one pending event to the guest scheduler and collects
	/// the result the guest wrote back.
	pub(crate) fn call_guest(&mut self, id: u64, args: Vec<Value>) -> Result<Value> {
		let (event, resume) = {
			let state = self.ctx.data();
			if state.exited {
				return Err(Error::AlreadyExited(state.exit_code.unwrap_or(0)));
			}
			if state.cancelled.load(Ordering::SeqCst) {
				return Err(Error::Cancelled);
			}
			let js_go = state.values.get(REF_GO).cloned().ok_or(Error::BadRef(REF_GO))?;
			let resume = state
				.resume
				.clone()
				.ok_or(Error::MissingExport(crate::RESUME_EXPORT))?;

			let event = Value::object("event");
			event.set("id", Value::Number(id as f64))?;
			event.set("this", js_go.clone())?;
			event.set("args", Value::from(args))?;
			// the scheduler clears this itself before dispatching
			js_go.set("_pendingEvent", event.clone())?;
			(event, resume)
		};

		trace!("resuming guest for wrapper {}", id);
		match resume.call(&mut self.ctx, ()) {
			Ok(()) => {}
			// an exit inside the handler is a normal way out
			Err(e) if self.ctx.data().exited => {
				trace!("guest exited during resume: {}", e);
			}
			Err(_) if self.ctx.data().cancelled.load(Ordering::SeqCst) => {
				return Err(Error::Cancelled)
			}
			Err(e) => return Err(Error::GuestCall(e.to_string())),
		}
		Ok(event.get("result").unwrap_or(Value::Undefined))
	}
}
