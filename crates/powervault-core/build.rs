use std::path::PathBuf;
use std::process::Command;

/// Runs git in the crate directory; `None` outside a checkout.
fn git(args: &[&str]) -> Option<String> {
    let dir = std::env::var("CARGO_MANIFEST_DIR").ok()?;
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    // Packagers building from a tarball can pin the revision.
    println!("cargo:rerun-if-env-changed=PVMD_BUILD_REV");

    let rev = std::env::var("PVMD_BUILD_REV")
        .ok()
        .filter(|r| !r.is_empty())
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=8"]))
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=PVMD_BUILD_REV={rev}");

    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        let git_dir = PathBuf::from(git_dir);
        println!("cargo:rerun-if-changed={}", git_dir.join("HEAD").display());
        println!("cargo:rerun-if-changed={}", git_dir.join("index").display());
    } else {
        println!("cargo:rerun-if-changed=build.rs");
    }
}
