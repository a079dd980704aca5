pub mod admin;
pub mod auth;
pub mod cities;
pub mod comments;
pub mod error;
pub mod images;
pub mod markers;
pub mod middleware;
pub mod reports;

use std::path::PathBuf;
use std::sync::Arc;

use amparo_db::Database;
use amparo_store::{Creator, LifecycleEngine, QueryFacade, RequestStore};
use amparo_types::models::Actor;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub store: Arc<RequestStore>,
    pub engine: LifecycleEngine,
    pub facade: QueryFacade,
    pub jwt_secret: String,
    pub image_dir: PathBuf,
}

pub fn store_creator(actor: Option<&Actor>) -> Creator<'_> {
    match actor {
        Some(actor) => Creator::Actor(actor),
        None => Creator::Citizen,
    }
}
