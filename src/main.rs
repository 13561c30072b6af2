mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use config::Config;
use db::db::DBClient;
use routes::create_router;
use service::{
    agreement_service::AgreementService,
    contract_service::ContractService,
    feedback_service::FeedbackService,
    realtime_service::RealtimeService,
};

#[derive(Debug)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    // Services
    pub agreement_service: Arc<AgreementService>,
    pub contract_service: Arc<ContractService>,
    pub feedback_service: Arc<FeedbackService>,
    pub realtime_service: Arc<RealtimeService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);

        let realtime_service = Arc::new(RealtimeService::new());
        let agreement_service = Arc::new(AgreementService::new(
            db_client_arc.clone(),
            realtime_service.clone(),
        ));
        let contract_service = Arc::new(ContractService::new(
            db_client_arc.clone(),
            realtime_service.clone(),
        ));
        let feedback_service = Arc::new(FeedbackService::new(
            db_client_arc.clone(),
            realtime_service.clone(),
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            agreement_service,
            contract_service,
            feedback_service,
            realtime_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            println!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    println!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .expect("failed to bind the server port");

    axum::serve(listener, app).await.expect("server error");
}
