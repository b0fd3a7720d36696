use std::process::Command;

fn main() {
    // Deploy platforms export the commit; local builds ask git directly.
    let git_hash = std::env::var("SOURCE_COMMIT")
        .or_else(|_| std::env::var("RAILWAY_GIT_COMMIT_SHA"))
        .unwrap_or_else(|_| {
            Command::new("git")
                .args(["rev-parse", "HEAD"])
                .output()
                .ok()
                .filter(|output| output.status.success())
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        });

    let short_hash = git_hash.get(..7).unwrap_or(&git_hash).to_string();

    println!("cargo:rustc-env=GIT_COMMIT_HASH={git_hash}");
    println!("cargo:rustc-env=GIT_COMMIT_SHORT={short_hash}");
    println!("cargo:rerun-if-changed=migrations");

    if std::path::Path::new(".git/HEAD").exists() {
        println!("cargo:rerun-if-changed=.git/HEAD");
        println!("cargo:rerun-if-changed=.git/refs/heads");
    }
}
