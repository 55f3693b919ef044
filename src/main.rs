use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;

use workstream::auth::{AuthMiddleware, TokenIssuer};
use workstream::config::Config;
use workstream::routes::{self, health};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("failed to connect to the database: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e)
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        log::error!("failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    let issuer = TokenIssuer::from_config(&config);

    log::info!("Starting WorkStream server at http://{}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(issuer.clone()))
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .configure(routes::public_config)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware::new(issuer.clone()))
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
