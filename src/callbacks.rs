//! The ABI callback surface imported by the guest under the `go`
//! namespace.
//!
//! Every callback has the shape `(sp: i32) -> ()`: the single argument
//! is the base of the guest's stack frame, and arguments/results live at
//! fixed offsets from it (8-byte slots, slice headers as two u64 words).
//! Callbacks that dispatch into host functions or re-enter the guest
//! re-query `getsp` before writing results, because the guest stack may
//! have grown during the nested call.

use log::{debug, info, trace};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wasmtime::{AsContextMut, Caller, Linker, Memory, TypedFunc};

use crate::error::{Error, Result};
use crate::event::Guest;
use crate::mem;
use crate::sys;
use crate::values::{Value, ValueTable};
use crate::{globals, GETSP_EXPORT, GO_NAMESPACE, MEM_EXPORT};

/// Per-instance bridge state, stored as the wasmtime `Store` data so
/// that every callback can recover it from its `Caller` without any
/// process-wide registry.
pub struct BridgeState {
	pub(crate) name: String,
	pub(crate) values: ValueTable,
	pub(crate) memory: Option<Memory>,
	pub(crate) resume: Option<TypedFunc<(), ()>>,
	pub(crate) getsp: Option<TypedFunc<(), i32>>,
	pub(crate) exit_code: Option<i32>,
	pub(crate) exited: bool,
	/// Shared with [`crate::CancelHandle`]s, which may flip it from
	/// other threads.
	pub(crate) cancelled: Arc<AtomicBool>,
}

impl BridgeState {
	pub(crate) fn new(name: &str) -> BridgeState {
		BridgeState {
			name: name.to_string(),
			values: ValueTable::new(globals::global(), globals::js_go()),
			memory: None,
			resume: None,
			getsp: None,
			exit_code: None,
			exited: false,
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}
}

/// Registers the full `go` import namespace on the linker.
pub(crate) fn add_to_linker(linker: &mut Linker<BridgeState>) -> Result<()> {
	linker.func_wrap(GO_NAMESPACE, "debug", debug_raw).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "runtime.wasmExit", wasm_exit).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "runtime.wasmWrite", wasm_write).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "runtime.nanotime", nanotime).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "runtime.walltime", walltime).map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "runtime.scheduleCallback", schedule_callback)
		.map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "runtime.clearScheduledCallback", clear_scheduled_callback)
		.map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "runtime.getRandomData", get_random_data).map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "runtime.scheduleTimeoutEvent", schedule_timeout_event)
		.map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "runtime.clearTimeoutEvent", clear_timeout_event)
		.map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.stringVal", string_val).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueGet", value_get).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueSet", value_set).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueIndex", value_index).map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "syscall/js.valueSetIndex", value_set_index)
		.map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueCall", value_call).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueInvoke", value_invoke).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueNew", value_new).map_err(Error::wasm)?;
	linker.func_wrap(GO_NAMESPACE, "syscall/js.valueLength", value_length).map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "syscall/js.valuePrepareString", value_prepare_string)
		.map_err(Error::wasm)?;
	linker
		.func_wrap(GO_NAMESPACE, "syscall/js.valueLoadString", value_load_string)
		.map_err(Error::wasm)?;
	Ok(())
}

/// Borrows the guest's linear memory and the bridge state together.
/// The byte view is re-borrowed from the store on every callback, so a
/// memory growth during re-entry can never leave a stale view behind.
fn mem_and_state<'a>(
	caller: &'a mut Caller<'_, BridgeState>,
) -> anyhow::Result<(&'a mut [u8], &'a mut BridgeState)> {
	let memory = caller.data().memory.ok_or(Error::MissingExport(MEM_EXPORT))?;
	Ok(memory.data_and_store_mut(caller))
}

fn current_sp(caller: &mut Caller<'_, BridgeState>) -> anyhow::Result<usize> {
	let getsp = caller
		.data()
		.getsp
		.clone()
		.ok_or(Error::MissingExport(GETSP_EXPORT))?;
	let sp = getsp.call(&mut *caller, ())?;
	Ok(sp as u32 as usize)
}

fn epoch_now() -> std::time::Duration {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
}

fn index_of(index: i64, len: usize) -> Result<usize> {
	let i = usize::try_from(index).unwrap_or(usize::MAX);
	if i < len {
		Ok(i)
	} else {
		Err(Error::Index { index: i, len })
	}
}

fn debug_raw(_caller: Caller<'_, BridgeState>, sp: i32) {
	info!("guest debug: {}", sp);
}

fn wasm_exit(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let code = mem::get_u32(data, frame + 8)? as i32;
	debug!("guest {:?} exited with code {}", state.name, code);
	state.exit_code = Some(code);
	state.exited = true;
	// an exit also fires the cancellation state; the exited flag is
	// checked first everywhere so callers still see AlreadyExited
	state.cancelled.store(true, Ordering::SeqCst);
	Ok(())
}

fn wasm_write(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, _state) = mem_and_state(&mut caller)?;
	let fd = mem::get_i64(data, frame + 8)?;
	let ptr = mem::get_i64(data, frame + 16)? as u64 as usize;
	let len = mem::get_i32(data, frame + 24)? as u32 as usize;
	let end = ptr.checked_add(len).ok_or(Error::OutOfBounds { addr: ptr, len })?;
	let buf = data.get(ptr..end).ok_or(Error::OutOfBounds { addr: ptr, len })?;
	// a failed runtime write leaves the guest runtime in an undefined
	// state, so it traps rather than being reported back
	sys::write_fd(fd, buf, None)?;
	Ok(())
}

fn nanotime(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, _state) = mem_and_state(&mut caller)?;
	mem::set_i64(data, frame + 8, epoch_now().as_nanos() as i64)?;
	Ok(())
}

fn walltime(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, _state) = mem_and_state(&mut caller)?;
	let now = epoch_now();
	mem::set_i64(data, frame + 8, now.as_secs() as i64)?;
	mem::set_i32(data, frame + 16, now.subsec_nanos() as i32)?;
	Ok(())
}

fn schedule_callback(_caller: Caller<'_, BridgeState>, _sp: i32) -> anyhow::Result<()> {
	Err(Error::Unsupported("runtime.scheduleCallback").into())
}

fn clear_scheduled_callback(_caller: Caller<'_, BridgeState>, _sp: i32) -> anyhow::Result<()> {
	Err(Error::Unsupported("runtime.clearScheduledCallback").into())
}

fn schedule_timeout_event(_caller: Caller<'_, BridgeState>, _sp: i32) -> anyhow::Result<()> {
	Err(Error::Unsupported("runtime.scheduleTimeoutEvent").into())
}

fn clear_timeout_event(_caller: Caller<'_, BridgeState>, _sp: i32) -> anyhow::Result<()> {
	Err(Error::Unsupported("runtime.clearTimeoutEvent").into())
}

fn get_random_data(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, _state) = mem_and_state(&mut caller)?;
	let range = mem::slice_range(data, frame + 8)?;
	OsRng
		.try_fill_bytes(&mut data[range])
		.map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
	Ok(())
}

fn string_val(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let s = mem::load_string(data, frame + 8)?;
	state.values.store(data, frame + 24, &Value::from(s))?;
	Ok(())
}

fn value_get(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (target, prop) = {
		let (data, state) = mem_and_state(&mut caller)?;
		let target = state.values.load(data, frame + 8)?;
		let prop = mem::load_string(data, frame + 16)?;
		(target, prop)
	};
	let sp = current_sp(&mut caller)?;
	let (data, state) = mem_and_state(&mut caller)?;
	let result = match &target {
		Value::Object(obj) => match obj.borrow().props.get(&prop).cloned() {
			Some(v) => v,
			None => {
				return Err(
					Error::MissingProperty(format!("{}.{}", obj.borrow().name, prop)).into()
				)
			}
		},
		// historical pass-through: a get on a non-object yields the
		// value itself
		other => other.clone(),
	};
	trace!("valueGet {:?} -> {:?}", prop, result);
	state.values.store(data, sp + 32, &result)?;
	Ok(())
}

fn value_set(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let target = state.values.load(data, frame + 8)?;
	let prop = mem::load_string(data, frame + 16)?;
	let v = state.values.load(data, frame + 32)?;
	trace!("valueSet {:?} = {:?}", prop, v);
	match &target {
		Value::Object(obj) => {
			obj.borrow_mut().props.insert(prop, v);
			Ok(())
		}
		other => Err(Error::Type { expected: "object", actual: other.kind() }.into()),
	}
}

fn value_index(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let target = state.values.load(data, frame + 8)?;
	let index = mem::get_i64(data, frame + 16)?;
	let result = match &target {
		Value::Array(items) => {
			let items = items.borrow();
			items[index_of(index, items.len())?].clone()
		}
		Value::Bytes(buf) => {
			let buf = buf.borrow();
			Value::Number(buf[index_of(index, buf.len())?] as f64)
		}
		other => {
			return Err(Error::Type { expected: "indexable value", actual: other.kind() }.into())
		}
	};
	state.values.store(data, frame + 24, &result)?;
	Ok(())
}

fn value_set_index(_caller: Caller<'_, BridgeState>, _sp: i32) -> anyhow::Result<()> {
	Err(Error::Unsupported("syscall/js.valueSetIndex").into())
}

fn value_call(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (func, name, args) = {
		let (data, state) = mem_and_state(&mut caller)?;
		let target = state.values.load(data, frame + 8)?;
		let name = mem::load_string(data, frame + 16)?;
		let args = state.values.load_slice(data, frame + 32)?;
		let func = match &target {
			Value::Object(obj) => match obj.borrow().props.get(&name) {
				Some(Value::Func(f)) => f.clone(),
				Some(_) => return Err(Error::NotAFunction(name).into()),
				None => return Err(Error::MissingProperty(name).into()),
			},
			other => {
				return Err(Error::Type { expected: "object", actual: other.kind() }.into())
			}
		};
		(func, name, args)
	};
	trace!("guest calls host function {:?} with {} args", name, args.len());
	let result = func.call(&mut Guest::new(caller.as_context_mut()), &args);
	finish_call(&mut caller, 56, 64, result)
}

fn value_invoke(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (func, args) = {
		let (data, state) = mem_and_state(&mut caller)?;
		let target = state.values.load(data, frame + 8)?;
		let args = state.values.load_slice(data, frame + 16)?;
		let func = match &target {
			Value::Func(f) => f.clone(),
			other => {
				return Err(Error::Type { expected: "host function", actual: other.kind() }.into())
			}
		};
		(func, args)
	};
	trace!("guest invokes host function with {} args", args.len());
	let result = func.call(&mut Guest::new(caller.as_context_mut()), &args);
	finish_call(&mut caller, 40, 48, result)
}

fn value_new(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (ctor, args) = {
		let (data, state) = mem_and_state(&mut caller)?;
		let target = state.values.load(data, frame + 8)?;
		let args = state.values.load_slice(data, frame + 16)?;
		let ctor = match &target {
			Value::Object(obj) => match obj.borrow().ctor {
				Some(ctor) => ctor,
				None => {
					return Err(Error::NotAFunction(obj.borrow().name.to_string()).into())
				}
			},
			other => {
				return Err(Error::Type { expected: "constructor", actual: other.kind() }.into())
			}
		};
		(ctor, args)
	};
	let result = ctor(&args);
	finish_call(&mut caller, 40, 48, result)
}

/// Writes the `(value, ok-flag)` pair of `valueCall`/`valueInvoke`/
/// `valueNew` at the given frame offsets, re-querying the stack pointer
/// first. A host error becomes its message text with the flag cleared,
/// which the guest's `syscall/js` wrapper re-raises.
fn finish_call(
	caller: &mut Caller<'_, BridgeState>,
	result_off: usize,
	flag_off: usize,
	result: Result<Value>,
) -> anyhow::Result<()> {
	let sp = current_sp(caller)?;
	let (data, state) = mem_and_state(caller)?;
	match result {
		Ok(v) => {
			state.values.store(data, sp + result_off, &v)?;
			mem::set_u8(data, sp + flag_off, 1)?;
		}
		Err(e) => {
			debug!("host function failed: {}", e);
			state.values.store(data, sp + result_off, &Value::from(e.to_string()))?;
			mem::set_u8(data, sp + flag_off, 0)?;
		}
	}
	Ok(())
}

fn value_length(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let target = state.values.load(data, frame + 8)?;
	let len = match &target {
		Value::Array(items) => items.borrow().len(),
		Value::Bytes(buf) => buf.borrow().len(),
		Value::String(s) => s.len(),
		other => {
			return Err(Error::Type { expected: "value with a length", actual: other.kind() }.into())
		}
	};
	mem::set_i64(data, frame + 16, len as i64)?;
	Ok(())
}

fn value_prepare_string(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let target = state.values.load(data, frame + 8)?;
	let s = target.to_string();
	let len = s.len() as i64;
	state.values.store(data, frame + 16, &Value::from(s))?;
	mem::set_i64(data, frame + 24, len)?;
	Ok(())
}

fn value_load_string(mut caller: Caller<'_, BridgeState>, sp: i32) -> anyhow::Result<()> {
	let frame = sp as u32 as usize;
	let (data, state) = mem_and_state(&mut caller)?;
	let target = state.values.load(data, frame + 8)?;
	let s = match &target {
		Value::String(s) => s.clone(),
		other => return Err(Error::Type { expected: "string", actual: other.kind() }.into()),
	};
	let range = mem::slice_range(data, frame + 16)?;
	let n = range.len().min(s.len());
	data[range.start..range.start + n].copy_from_slice(&s.as_bytes()[..n]);
	Ok(())
}
