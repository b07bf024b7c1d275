#[tokio::main]
async fn main() {
    encuesta::start_server().await;
}
