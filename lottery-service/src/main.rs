use lambda_http::{run, Error};
use log::info;
use lottery_service::routes::create_router;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Lottery Service Lambda");

    let app = create_router().await?;
    run(app).await
}
