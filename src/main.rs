use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fiesta_menu_api::{
    build_router, config::Config, db, middleware::auth::JwtSecret, services::menu::MenuService,
    store::PgStore, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let store = Arc::new(PgStore::new(pool));
    let state = AppState {
        menus: Arc::new(MenuService::new(store.clone(), config.publish_credit)),
        ledger: store,
    };

    let app = build_router(state, JwtSecret(config.jwt_secret.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    info!("fiesta menu API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
