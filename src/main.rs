use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use log::*;
use sqlx::Connection;

mod api_models;
mod config;
mod db;

use config::Config;
use db::{ConnectionProvider, PgConnector, RetryPolicy};

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn ConnectionProvider>,
    pub static_dir: PathBuf,
}

impl AppState {
    fn index_page(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }
}

/**
 * The routes module contains all the tide routes and the logic to fulfill the responses for each
 * route.
 */
mod routes {
    use tide::{Body, Request};

    use crate::AppState;

    /**
     *  GET /
     */
    pub async fn index(req: Request<AppState>) -> Result<Body, tide::Error> {
        Ok(Body::from_file(req.state().index_page()).await?)
    }

    pub mod api {
        use log::*;
        use sqlx::{Connection, Row};
        use tide::{Body, Request, Response, StatusCode};

        use crate::api_models::{ApiError, Ballot, Receipt, Tally};
        use crate::db::ConnectionProvider;
        use crate::AppState;

        /**
         *  POST /api/vote
         *
         *  Records one vote for the choice named in the request body.
         */
        pub async fn vote(mut req: Request<AppState>) -> Result<Response, tide::Error> {
            let ballot = match req.body_json::<Ballot>().await {
                Ok(ballot) => ballot,
                Err(err) => {
                    debug!("Rejecting unreadable ballot: {}", err);
                    return reject(
                        StatusCode::BadRequest,
                        ApiError::new("Request body must be a JSON object with a string `choice`"),
                    );
                }
            };

            let choice = ballot.choice.trim();
            if choice.is_empty() {
                return reject(StatusCode::BadRequest, ApiError::new("`choice` must not be empty"));
            }

            let mut conn = match req.state().db.acquire().await {
                Ok(conn) => conn,
                Err(err) => {
                    error!("Failed to get a connection: {}", err);
                    return reject(StatusCode::InternalServerError, ApiError::db_unavailable());
                }
            };

            sqlx::query("INSERT INTO votes (choice) VALUES ($1)")
                .bind(choice)
                .execute(&mut conn)
                .await?;
            conn.close().await?;

            info!("Vote recorded for: {}", choice);
            let response = Response::builder(StatusCode::Ok)
                .body(Body::from_json(&Receipt::for_choice(choice))?)
                .build();
            Ok(response)
        }

        /**
         *  GET /api/results
         *
         *  Vote counts grouped by choice; choices with no votes are absent.
         */
        pub async fn results(req: Request<AppState>) -> Result<Response, tide::Error> {
            let mut conn = match req.state().db.acquire().await {
                Ok(conn) => conn,
                Err(err) => {
                    error!("Failed to get a connection: {}", err);
                    return reject(StatusCode::InternalServerError, ApiError::db_unavailable());
                }
            };

            let rows = sqlx::query("SELECT choice, COUNT(id) AS tally FROM votes GROUP BY choice")
                .fetch_all(&mut conn)
                .await?;
            conn.close().await?;

            let mut tally = Tally::new();
            for row in rows.iter() {
                tally.insert(row.try_get("choice")?, row.try_get("tally")?);
            }

            let response = Response::builder(StatusCode::Ok)
                .body(Body::from_json(&tally)?)
                .build();
            Ok(response)
        }

        fn reject(status: StatusCode, error: ApiError) -> Result<Response, tide::Error> {
            Ok(Response::builder(status).body(Body::from_json(&error)?).build())
        }
    }
}

/**
 * Create the votes table if it is absent
 *
 * Not fatal on failure: the store may not be up yet, and every handler
 * surfaces its own connection errors once traffic arrives.
 */
async fn initialize_schema(connector: &PgConnector) {
    match connector.acquire().await {
        Ok(mut conn) => {
            if let Err(err) = db::ensure_schema(&mut conn).await {
                error!("Failed to initialize the votes table: {}", err);
            } else {
                info!("Database initialized, votes table checked/created");
            }
            let _ = conn.close().await;
        }
        Err(err) => {
            error!("Could not connect to database to initialize: {}", err);
        }
    }
}

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {}", err);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, err));
        }
    };

    let connector = PgConnector::new(&config, RetryPolicy::default());
    initialize_schema(&connector).await;

    let state = AppState {
        db: Arc::new(connector),
        static_dir: config.static_dir.clone(),
    };

    let mut app = tide::with_state(state);
    app.with(driftwood::ApacheCombinedLogger);
    app.at("/").get(routes::index);
    app.at("/api/vote").post(routes::api::vote);
    app.at("/api/results").get(routes::api::results);
    app.listen(config.bind).await
}
