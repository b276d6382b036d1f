#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dynform::cli::main().await
}
