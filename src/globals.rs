//! The synthetic global object graph.
//!
//! A Go `js/wasm` module probes a handful of JavaScript built-ins during
//! runtime startup. This module builds the minimum graph that satisfies
//! those probes: constructors for `Object`, `Array`, `Uint8Array`,
//! `Date`, `Headers` and `AbortController`, the `crypto` and `fs`
//! surfaces the runtime prints and seeds entropy through, and an empty
//! `process` placeholder.

use chrono::{Local, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::sys;
use crate::values::Value;

fn arg<'a>(args: &'a [Value], i: usize) -> Result<&'a Value> {
	args.get(i).ok_or(Error::Index { index: i, len: args.len() })
}

/// Builds the `global` object (value reference 5).
pub(crate) fn global() -> Value {
	let global = Value::object("global");
	let props = [
		("Object", Value::constructor("Object", object_ctor)),
		("Array", Value::constructor("Array", uint8_array_ctor)),
		("Uint8Array", Value::constructor("Uint8Array", uint8_array_ctor)),
		("Date", Value::constructor("Date", date_ctor)),
		("Headers", Value::constructor("Headers", headers_ctor)),
		("AbortController", Value::constructor("AbortController", abort_controller_ctor)),
		("crypto", crypto()),
		("fs", fs()),
		("process", Value::object("process")),
		("fetch", Value::func(|_, _| Err(Error::Unsupported("fetch")))),
	];
	for (name, v) in props {
		// global is an object value; set() cannot fail
		let _ = global.set(name, v);
	}
	global
}

/// Builds the `jsGo` object (value reference 6) the guest runtime
/// dispatches events through.
pub(crate) fn js_go() -> Value {
	let go = Value::object("go");
	let _ = go.set(
		"_makeFuncWrapper",
		Value::func(|_, args| {
			let id = arg(args, 0)?.as_number()? as u64;
			Ok(Value::FuncWrapper(id))
		}),
	);
	let _ = go.set("_pendingEvent", Value::Null);
	go
}

fn object_ctor(_args: &[Value]) -> Result<Value> {
	Ok(Value::object("ObjectInner"))
}

fn uint8_array_ctor(args: &[Value]) -> Result<Value> {
	let len = match args.first() {
		Some(v) => v.as_number()? as usize,
		None => 0,
	};
	Ok(Value::from_bytes(vec![0u8; len]))
}

fn date_ctor(_args: &[Value]) -> Result<Value> {
	let millis = Utc::now().timestamp_millis() as f64;
	let date = Value::object("Date");
	date.set("getTime", Value::func(move |_, _| Ok(Value::Number(millis))))?;
	date.set(
		"getTimezoneOffset",
		Value::func(|_, _| {
			let secs = Local::now().offset().local_minus_utc();
			Ok(Value::Number(-(secs / 60) as f64))
		}),
	)?;
	Ok(date)
}

fn headers_ctor(_args: &[Value]) -> Result<Value> {
	let headers = Value::object("Headers");
	let target = match &headers {
		Value::Object(obj) => Rc::downgrade(obj),
		_ => unreachable!(),
	};
	headers.set(
		"append",
		Value::func(move |_, args| {
			let key = arg(args, 0)?.to_string();
			let val = arg(args, 1)?.clone();
			if let Some(obj) = target.upgrade() {
				obj.borrow_mut().props.insert(key, val);
			}
			Ok(Value::Undefined)
		}),
	)?;
	Ok(headers)
}

fn abort_controller_ctor(_args: &[Value]) -> Result<Value> {
	let controller = Value::object("AbortController");
	controller.set("signal", Value::object("AbortSignal"))?;
	Ok(controller)
}

fn crypto() -> Value {
	let crypto = Value::object("crypto");
	let _ = crypto.set(
		"getRandomValues",
		Value::func(|_, args| {
			let buf = match arg(args, 0)? {
				Value::Bytes(b) => b.clone(),
				other => {
					return Err(Error::Type { expected: "Uint8Array", actual: other.kind() })
				}
			};
			let mut buf = buf.borrow_mut();
			OsRng
				.try_fill_bytes(&mut buf)
				.map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
			Ok(Value::Number(buf.len() as f64))
		}),
	);
	crypto
}

fn fs() -> Value {
	let constants = Value::object("constants");
	for (name, flag) in [
		("O_WRONLY", libc::O_WRONLY),
		("O_RDWR", libc::O_RDWR),
		("O_CREAT", libc::O_CREAT),
		("O_TRUNC", libc::O_TRUNC),
		("O_APPEND", libc::O_APPEND),
		("O_EXCL", libc::O_EXCL),
	] {
		let _ = constants.set(name, Value::from(flag));
	}

	let fs = Value::object("fs");
	let _ = fs.set("constants", constants);
	let _ = fs.set("write", Value::func(fs_write));
	fs
}

// (fd, buf, offset, length, position, callback): writes
// buf[offset..offset+length], positionally when position is non-null,
// then reports (null, n) back through the guest callback.
fn fs_write(guest: &mut crate::event::Guest<'_>, args: &[Value]) -> Result<Value> {
	let fd = arg(args, 0)?.as_number()? as i64;
	let buf = match arg(args, 1)? {
		Value::Bytes(b) => b.clone(),
		other => return Err(Error::Type { expected: "Uint8Array", actual: other.kind() }),
	};
	let offset = arg(args, 2)?.as_number()? as usize;
	let length = arg(args, 3)?.as_number()? as usize;
	let position = match arg(args, 4)? {
		Value::Null | Value::Undefined => None,
		v => Some(v.as_number()? as u64),
	};
	let callback = match arg(args, 5)? {
		Value::FuncWrapper(id) => *id,
		other => return Err(Error::Type { expected: "callback", actual: other.kind() }),
	};

	let n = {
		let data = buf.borrow();
		let end = offset
			.checked_add(length)
			.ok_or(Error::OutOfBounds { addr: offset, len: length })?;
		let chunk = data
			.get(offset..end)
			.ok_or(Error::OutOfBounds { addr: offset, len: length })?;
		sys::write_fd(fd, chunk, position)?
	};

	guest.call_guest(callback, vec![Value::Null, Value::Number(n as f64)])?;
	Ok(Value::Undefined)
}
