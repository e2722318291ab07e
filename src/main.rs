use std::sync::Arc;

use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rideshare::config::Config;
use rideshare::db::{AppState, create_pool, init_db, queries};
use rideshare::handlers;
use rideshare::jwt::SessionKeys;
use rideshare::models::{CreateRide, CreateUser, DATE_FORMAT, Place, TIME_FORMAT};
use rideshare::payments::StripeClient;

/// Lifetime of the tokens printed by `--seed`.
const SEED_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Parser, Debug)]
#[command(name = "rideshare")]
#[command(about = "Ride-sharing backend: seat reservation and payment reconciliation")]
struct Cli {
    /// Seed the database with dev users and a ride, and print session tokens (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Archive rides whose departure has passed, then exit (for an external scheduler)
    #[arg(long)]
    archive_departed: bool,
}

fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::get_user_by_email(&conn, "driver@rideshare.local")
        .expect("Failed to look up seed user")
        .is_some()
    {
        tracing::info!("Database already has seed data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let seed_users = [
        ("driver@rideshare.local", "Dev Driver", "+34600000001"),
        ("rider1@rideshare.local", "Dev Rider One", "+34600000002"),
        ("rider2@rideshare.local", "Dev Rider Two", "+34600000003"),
    ];

    let mut users = Vec::new();
    for (email, name, phone) in seed_users {
        let user = queries::create_user(
            &conn,
            &CreateUser {
                email: email.to_string(),
                name: name.to_string(),
                phone: phone.to_string(),
            },
        )
        .expect("Failed to create seed user");
        users.push(user);
    }

    let departs = Utc::now().naive_utc() + ChronoDuration::days(1);
    let ride = queries::create_ride(
        &conn,
        &users[0].id,
        &CreateRide {
            origin: Place {
                name: "Madrid".to_string(),
                latitude: Some(40.4168),
                longitude: Some(-3.7038),
            },
            destination: Place {
                name: "Valencia".to_string(),
                latitude: Some(39.4699),
                longitude: Some(-0.3763),
            },
            departure_date: departs.format(DATE_FORMAT).to_string(),
            departure_time: departs.format(TIME_FORMAT).to_string(),
            total_seats: 2,
        },
    )
    .expect("Failed to create seed ride");

    tracing::info!("Ride {}: {} -> {}, {} seats", ride.id, ride.origin.name, ride.destination.name, ride.total_seats);

    for user in &users {
        let token = state
            .sessions
            .issue(&user.id, SEED_TOKEN_TTL_SECS)
            .expect("Failed to issue seed token");
        tracing::info!("{} <{}>: Bearer {}", user.name, user.email, token);
    }

    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rideshare=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path, config.db_pool_size, config.db_busy_timeout)
        .expect("Failed to create database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    if cli.archive_departed {
        let conn = db_pool.get().expect("Failed to get connection");
        match queries::archive_departed_rides(&conn, Utc::now().naive_utc()) {
            Ok(count) => tracing::info!("Archived {} departed ride(s)", count),
            Err(e) => {
                tracing::error!("Failed to archive departed rides: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY not set; payment calls will fail");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set; every webhook will be rejected");
    }

    let mut stripe = StripeClient::new(&config.stripe_secret_key);
    if let Some(api_base) = &config.stripe_api_base {
        tracing::info!("Using Stripe API base {}", api_base);
        stripe = stripe.with_api_base(api_base);
    }

    let state = AppState {
        db: db_pool,
        payments: Arc::new(stripe),
        webhook_secret: config.stripe_webhook_secret.clone(),
        sessions: SessionKeys::from_secret(&config.jwt_secret),
        join_fee: config.join_fee.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set RIDESHARE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!(
        "Rideshare server listening on {} (join fee {} {})",
        addr,
        config.join_fee.amount_cents,
        config.join_fee.currency
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
