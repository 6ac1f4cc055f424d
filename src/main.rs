use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;
use env_logger::Env;
use log::info;

use cbrf_proxy::config::Config;
use cbrf_proxy::handlers::{self, AppState};

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let state = web::Data::new(AppState::new(&config)?);

    info!(
        "Start listening on {} (upstream {}, {:?} failure policy)",
        config.listen_addr, config.upstream_url, config.failure_policy
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(config.listen_addr)?
    .run()
    .await?;

    Ok(())
}
