use clap::Parser;
use gitsearch::api::Error;
use gitsearch_app::Args;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let context = gitsearch_app::run(args).await?;

    gitsearch_app::write_summary(&context, &mut std::io::stdout().lock())?;
    Ok(())
}
