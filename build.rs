use std::error::Error;

use vergen::{BuildBuilder, CargoBuilder, Emitter};

/// `wgb --version` reads VERGEN_BUILD_DATE and VERGEN_CARGO_TARGET_TRIPLE and
/// falls back to placeholders, so a failure here only warns.
fn main() {
    if let Err(e) = emit_version_info() {
        println!("cargo:warning=version metadata unavailable: {e}");
    }
}

fn emit_version_info() -> Result<(), Box<dyn Error>> {
    let build = BuildBuilder::default().build_date(true).build()?;
    let cargo = CargoBuilder::default().target_triple(true).build()?;
    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .emit()?;
    Ok(())
}
