//! Object mask preview CLI
//!
//! Draws a selection over an image, detects the object inside it and emits
//! the object removal job config.

#[cfg(feature = "cli")]
use objmask::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
