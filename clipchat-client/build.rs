use std::path::{Path, PathBuf};

const BIN_NAME: &str = "ClipChat";

fn main() {
    let assets: PathBuf = [env!("CARGO_MANIFEST_DIR"), "assets"].iter().collect();
    let manifest_path = assets.join("app.manifest");

    println!("cargo:rerun-if-changed={}", manifest_path.display());
    println!("cargo:rerun-if-changed={}", assets.join("clipchat.ico").display());

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if target_os == "windows" && target_env == "msvc" {
        embed_manifest(BIN_NAME, &manifest_path);
    }
}

/// Has the MSVC linker embed `manifest` as the binary's RT_MANIFEST resource, so no `rc.exe`
/// step is needed. Themed native dialogs require the Common Controls v6 dependency it declares.
fn embed_manifest(bin: &str, manifest: &Path) {
    println!("cargo:rustc-link-arg-bin={bin}=/MANIFEST:EMBED");
    println!(
        "cargo:rustc-link-arg-bin={bin}=/MANIFESTINPUT:{}",
        manifest.display()
    );
}
