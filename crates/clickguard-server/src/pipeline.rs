//! Tracking pipeline initialization

use crate::config::ServerConfig;
use anyhow::Result;
use clickguard_sdk::{PipelineConfig, TrackingPipeline, TrackingPipelineBuilder};
use tracing::info;

/// Build the pipeline from the server configuration
pub async fn init_pipeline(config: &ServerConfig) -> Result<TrackingPipeline> {
    let pipeline_config = match &config.pipeline_config {
        Some(path) => {
            info!("Loading pipeline config from {}", path.display());
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };

    let mut builder = TrackingPipelineBuilder::new().with_config(pipeline_config);
    if let Some(secret) = &config.server_secret {
        builder = builder.with_secret(secret.clone());
    }
    if let Some(seed) = &config.directory_seed {
        builder = builder.with_directory_seed(seed);
    }
    builder = with_storage(builder, config).await?;

    Ok(builder.build().await?)
}

#[cfg(feature = "postgres")]
async fn with_storage(
    builder: TrackingPipelineBuilder,
    config: &ServerConfig,
) -> Result<TrackingPipelineBuilder> {
    use clickguard_runtime::storage::PostgresStore;
    use std::sync::Arc;

    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.migrate().await?;
            info!("Connected to PostgreSQL");
            Ok(builder.with_postgres(Arc::new(store)))
        }
        None => {
            info!("No database URL configured, using in-memory storage");
            Ok(builder)
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn with_storage(
    builder: TrackingPipelineBuilder,
    config: &ServerConfig,
) -> Result<TrackingPipelineBuilder> {
    if config.database_url.is_some() {
        anyhow::bail!("a database URL is configured but the server was built without the postgres feature");
    }
    info!("Using in-memory storage");
    Ok(builder)
}
