//
// main.rs
// Image-Tools-rs
//
// Tokio entry point that hands off execution to the CLI layer; the batch itself runs on a blocking task.
//

use image_tools::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}
