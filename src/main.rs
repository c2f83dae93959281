use video_search::config::Config;
use video_search::lifecycle;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = lifecycle::run(config).await {
        tracing::error!(error = ?err, "Video search service failed to start");
        eprintln!("Video search service failed to start: {:?}", err);
        std::process::exit(1);
    }
}
