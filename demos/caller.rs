//! Minimal host: loads a guest module, gives it an `addProxy` function
//! and lets it run.
//!
//! Build a matching guest with `GOOS=js GOARCH=wasm go build -o
//! main.wasm`, then: `cargo run --example caller -- main.wasm`

use gojs::Bridge;

fn main() -> gojs::Result<()> {
	env_logger::init();

	let path = std::env::args().nth(1).unwrap_or_else(|| "main.wasm".to_string());
	let mut bridge = Bridge::from_file("caller", &path)?;

	bridge.set_func("addProxy", |guest, args| {
		println!("in host: {:?}", args);
		guest.call_func("addition", args.to_vec())
	})?;

	bridge.run()?;
	if let Some(code) = bridge.exit_code() {
		println!("guest exited with code {}", code);
	}
	Ok(())
}
