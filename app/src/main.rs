#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sor_server::run().await
}
