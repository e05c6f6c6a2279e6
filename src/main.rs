use anyhow::Result;
use iris_fetch::{start_server, IrisConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = IrisConfig::from_env();
    iris_fetch::logging::init(&config);

    start_server(config).await
}
