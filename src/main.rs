use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use gavel_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    lock::{LockService, RedisLockService},
    middlewares::{AuthMiddleware, create_cors},
    queue::{MessageBus, QueueConsumer, RedisMessageBus},
    services::{AuctionService, AuthService, BidService, Finalizer, WalletService},
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // Lock backing cache and queue backing may point at different instances
    let cache_pool = deadpool_redis::Config::from_url(config.cache.url())
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("Failed to create cache pool");
    let queue_pool = deadpool_redis::Config::from_url(config.queue.url.clone())
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("Failed to create queue pool");

    let locks: Arc<dyn LockService> = Arc::new(RedisLockService::new(cache_pool));
    let bus: Arc<dyn MessageBus> = Arc::new(RedisMessageBus::new(queue_pool.clone()));

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // Bid placement uses the configured TTL; finalizer stages get twice that.
    let lock_ttl = Duration::from_millis(config.lock.default_ttl_ms);

    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let auction_service = AuctionService::new(pool.clone(), bus.clone());
    let bid_service = BidService::new(pool.clone(), locks.clone(), bus.clone(), lock_ttl);
    let wallet_service = WalletService::new(pool.clone());
    let finalizer = Arc::new(Finalizer::new(
        pool.clone(),
        locks.clone(),
        bus.clone(),
        lock_ttl * 2,
    ));

    // Stage/trigger consumers and the scheduler safety net
    QueueConsumer::new(
        queue_pool,
        finalizer.clone(),
        Duration::from_millis(config.queue.delay_warning_ms),
    )
    .spawn();
    tasks::spawn_all(pool.clone(), bus.clone(), config.scheduler.interval_ms);

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(auction_service.clone()))
            .app_data(web::Data::new(bid_service.clone()))
            .app_data(web::Data::new(wallet_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::bid_config)
                    .configure(handlers::auction_config)
                    .configure(handlers::wallet_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
