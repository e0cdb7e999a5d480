//! Tallyman CLI entry point.

use tallyman_lib::cli::{self, Cli};
use tallyman_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
