#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    server::start_server().await
}
