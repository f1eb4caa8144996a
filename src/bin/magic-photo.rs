//! magic-photo command line tool
//!
//! Background removal and magic eraser for PNG and JPEG photos.

#[cfg(feature = "cli")]
use magic_photo::cli;

#[cfg(feature = "cli")]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
