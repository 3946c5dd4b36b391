//! Build script for the dynbind test fixture
//!
//! Compiles `fixtures/fixture.c` into a shared library with the host C compiler
//! and exports its location as `DYNBIND_FIXTURE`. The library is only used by
//! the integration tests; a missing compiler degrades to a warning and the
//! fixture-backed tests fail unless `DYNBIND_ALLOW_MISSING_FIXTURE` is set.

use std::env;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=fixtures/fixture.c");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let source = Path::new("fixtures").join("fixture.c");
    let output = out_dir.join(fixture_filename(&target_os));

    match compile_fixture(&source, &output, &out_dir) {
        Ok(()) => {
            println!("cargo:rustc-env=DYNBIND_FIXTURE={}", output.display());
        }
        Err(reason) => {
            println!(
                "cargo:warning=dynbind: fixture module not built ({}); set DYNBIND_ALLOW_MISSING_FIXTURE to skip fixture tests",
                reason
            );
        }
    }
}

/// Platform-specific shared library name for the fixture
fn fixture_filename(target_os: &str) -> String {
    match target_os {
        "windows" => "dynbind_fixture.dll".to_string(),
        "macos" | "ios" => "libdynbind_fixture.dylib".to_string(),
        _ => "libdynbind_fixture.so".to_string(),
    }
}

fn compile_fixture(source: &Path, output: &Path, out_dir: &Path) -> Result<(), String> {
    let compiler = cc::Build::new()
        .cargo_metadata(false)
        .try_get_compiler()
        .map_err(|e| e.to_string())?;

    let mut command = compiler.to_command();
    if compiler.is_like_msvc() {
        command
            .arg("/nologo")
            .arg("/LD")
            .arg(source)
            .arg(format!("/Fo{}\\", out_dir.display()))
            .arg(format!("/Fe{}", output.display()));
    } else {
        command
            .args(["-shared", "-fPIC", "-O1", "-o"])
            .arg(output)
            .arg(source);
    }

    let status = command
        .status()
        .map_err(|e| format!("failed to run {}: {}", compiler.path().display(), e))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("compiler exited with {}", status))
    }
}
