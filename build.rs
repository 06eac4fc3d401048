use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    // Exact tag of the checked-out commit; untagged builds fall back to the crate version.
    if let Some(tag) = git(&["describe", "--tags", "--exact-match"]) {
        println!("cargo:rustc-env=GIT_TAG={tag}");
    }
    if let Some(sha) = git(&["rev-parse", "--short", "HEAD"]) {
        println!("cargo:rustc-env=GIT_SHA={sha}");
    }
}
