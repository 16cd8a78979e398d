use clap::Subcommand;
use habitrack_core::{Database, LocalCache, SqliteCache};

use crate::context::CliResult;

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop every cached habit list and completion log
    Clear,
}

pub async fn run(action: CacheAction) -> CliResult {
    match action {
        CacheAction::Clear => {
            let cache = SqliteCache::new(Database::open()?);
            cache.clear().await?;
            println!("cache cleared");
        }
    }
    Ok(())
}
