#[tokio::main]
async fn main() {
    if let Err(e) = ldprotest_client::run().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
