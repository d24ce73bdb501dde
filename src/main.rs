mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Credentials may live in a .env file next to the binary
    dotenvy::dotenv().ok();

    cli::run().await?;

    Ok(())
}
