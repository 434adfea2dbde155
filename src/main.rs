use log::{error, info};
use registrar::settings::Settings;
use registrar::{build_router, open_database, template};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load()?;
    template::set_display_logs(settings.template.debug);
    info!("Starting registrar (debug = {})", settings.debug);

    let db = match open_database(&settings).await {
        Ok(db) => db,
        Err(e) => {
            error!("Database setup failed: {}", e);
            return Err(e.into());
        }
    };

    let router = build_router(db, settings.clone());
    router.run(&settings).await
}
