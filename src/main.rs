#[tokio::main]
async fn main() {
    leaderboard::start_server().await;
}
