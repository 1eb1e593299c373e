use std::net::SocketAddr;

use axum_server::tls_rustls::RustlsConfig;
use edu_journal::config::{load_env, AppConfig, Environment};
use edu_journal::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    let config = AppConfig::from_env()?;
    init_tracing(config.env);

    tracing::info!(env = ?config.env, jwt = ?config.jwt, "starting edu-journal");

    let pool = db::init(&config.database_url).await?;
    let app = app::create_app_with_config(pool, &config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            tracing::info!("listening on https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!("listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

fn init_tracing(env: Environment) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter_layer);

    match env {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        Environment::Local => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
    }
}
