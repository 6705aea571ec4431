//! `convoy version` — print the CLI version.

/// Run `convoy version`.
pub fn run() {
    println!("convoy {}", env!("CARGO_PKG_VERSION"));
}
