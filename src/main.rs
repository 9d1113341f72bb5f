#[tokio::main]
async fn main() {
    if let Err(e) = comments_relay::run_with_config().await {
        tracing::error!(error = %e, "relay exited with error");
        std::process::exit(1);
    }
}
