pub mod error;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod orm;
pub mod reconcile;
pub mod router;
pub mod settings;
pub mod store;
pub mod template;
pub mod views;

inventory::collect!(crate::orm::Migration);

use std::sync::Arc;

use crate::orm::Db;
use crate::router::{AppState, Router, access_log, request_timer};
use crate::settings::Settings;
use crate::store::SqliteStore;

/// Connect to the configured database and bring the schema and seed data up to date.
pub async fn open_database(settings: &Settings) -> Result<Arc<Db>, sqlx::Error> {
    let db = Arc::new(
        Db::connect_with(&settings.database.url, settings.database.max_connections).await?,
    );
    orm::auto_migrate(db.clone()).await?;
    orm::apply_migration_files(db.clone(), &settings.database.migrations_dir).await?;
    Ok(db)
}

/// The student routes, wired to a SQLite-backed store.
pub fn build_router(db: Arc<Db>, settings: Settings) -> Router {
    let mut router = Router::new();
    router.add_middleware(request_timer());
    router.add_post_middleware(access_log());
    crate::route!(router,
        GET "/" => { handlers::home_route },
        GET "/students" => { handlers::index_route },
        GET "/students/create" => { handlers::create_form_route },
        POST "/students/create" => { handlers::create_route },
        GET "/students/edit" => { handlers::edit_form_route },
        GET "/students/edit/:id" => { handlers::edit_form_route },
        POST "/students/edit/:id" => { handlers::edit_route },
    );
    router.set_app_state(AppState {
        store: Arc::new(SqliteStore::new(db)),
        settings,
    });
    router
}
