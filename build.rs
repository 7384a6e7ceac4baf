// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=BARCODE_SCANNER_VERSION");

    // Packagers can pin the version string explicitly
    let version = if let Ok(v) = std::env::var("BARCODE_SCANNER_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    // Outside a git checkout (crates.io tarball, vendored source) only the
    // package version is known
    let Some(commit_hash) = get_commit_hash() else {
        return pkg_version;
    };

    // "v0.1.0" at a tag, "v0.1.0-5-gabcdef1" after it
    let described = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match described {
        Some(version) if version.starts_with('v') => {
            let version = version.trim_start_matches('v');
            if version.contains('-') {
                let parts: Vec<&str> = version.rsplitn(3, '-').collect();
                if parts.len() >= 3 {
                    let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
                    return format!("{}-dirty-{}", parts[2], hash);
                }
                version.to_string()
            } else {
                format!("{}-{}", version, commit_hash)
            }
        }
        // No release tag yet: package version plus commit
        _ => format!("{}-{}", pkg_version, commit_hash),
    }
}

fn get_commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
