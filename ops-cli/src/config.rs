use anyhow::Context;
use database_layer::DatabaseConfig;

/// Build the database configuration, preferring an explicit `--database-url`
/// over the process environment for the URL itself.
pub fn database_config(database_url: Option<&str>) -> anyhow::Result<DatabaseConfig> {
    database_config_with(database_url, |key| std::env::var(key).ok())
}

fn database_config_with<F>(database_url: Option<&str>, env: F) -> anyhow::Result<DatabaseConfig>
where
    F: Fn(&str) -> Option<String>,
{
    DatabaseConfig::from_lookup(|key| match (key, database_url) {
        ("DATABASE_URL", Some(url)) => Some(url.to_string()),
        _ => env(key),
    })
    .context("Invalid database configuration")
}
