#[tokio::main]
async fn main() {
    q_lsp::server::run().await;
}
