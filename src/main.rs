use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pagelens::cli::run().await
}
