//! tagstats CLI entry point.

use tagstats::cli::{self, Cli};
use tagstats::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
