//! Two-way calls: the guest calls `addProxy` on startup, then the host
//! drives guest-registered functions and round-trips a byte buffer.
//!
//! Run against a guest that registers `addition`, `multiplier`,
//! `getBytes` and `bytes`: `cargo run --example function-caller --
//! main.wasm`

use gojs::{Bridge, Value};

fn main() -> gojs::Result<()> {
	env_logger::init();

	let path = std::env::args().nth(1).unwrap_or_else(|| "main.wasm".to_string());
	let mut bridge = Bridge::from_file("function-caller", &path)?;

	bridge.set_func("addProxy", |guest, args| {
		println!("in host: {:?}", args);
		guest.call_func("addition", args.to_vec())
	})?;

	bridge.run()?;

	let m = bridge.call_func("multiplier", vec![])?;
	println!("multiplier: {}", 10.0 * m.as_number()?);

	let res = bridge.call_func("getBytes", vec![])?;
	let bytes = res.as_bytes()?;
	println!("guest bytes: {:?}", bytes);

	let back = bridge.call_func("bytes", vec![Value::from_bytes(bytes.clone())])?;
	assert_eq!(back.as_bytes()?, bytes);
	println!("byte round trip ok");
	Ok(())
}
