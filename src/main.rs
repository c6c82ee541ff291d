// Sluice - static asset pipeline
// Entry point with clean separation of concerns

use sluice::cli::CliHandler;

#[tokio::main]
async fn main() {
    let handler = CliHandler::new();

    if let Err(e) = handler.run().await {
        eprintln!("❌ Error: {}", e.format_detailed());
        std::process::exit(1);
    }
}
