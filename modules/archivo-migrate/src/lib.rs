pub mod backend;
pub mod config;
pub mod dates;
pub mod error;
pub mod layout;
pub mod media;
pub mod migrate;
pub mod post;
pub mod scan;
pub mod store;
pub mod summary;
pub mod text;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{Author, EnvLayer, Invocation, MigrateConfig};
pub use error::{MigrateError, Result};
pub use layout::SiteLayout;
pub use migrate::{MigrationStats, Migrator};
pub use store::{DocumentStore, ObjectStore, ObjectUpload, PostRecord};
pub use summary::DryRunSummary;
pub use types::LegacyPost;

use tracing::info;

/// What a run produced.
#[derive(Debug)]
pub enum RunOutcome {
    DryRun(DryRunSummary),
    Migrated(MigrationStats),
}

/// Extract every requested year and fail on duplicate post ids.
pub async fn extract(config: &MigrateConfig) -> Result<Vec<LegacyPost>> {
    let posts = post::collect_posts(&config.layout, &config.years).await?;
    post::ensure_unique_post_ids(&posts)?;
    info!(posts = posts.len(), "Extraction complete");
    Ok(posts)
}

/// Full run against Firebase. Dry runs never load credentials.
pub async fn run(config: &MigrateConfig) -> Result<RunOutcome> {
    let posts = extract(config).await?;
    if config.dry_run {
        return Ok(RunOutcome::DryRun(DryRunSummary::build(
            &config.years,
            &posts,
            &config.layout,
        )));
    }

    backend::warn_implicit_settings(config);
    let firebase = backend::connect(config).await?;
    migrate_posts(config, &posts, &firebase.posts, &firebase.objects).await
}

/// Same as [`run`] with caller-provided stores.
pub async fn run_with(
    config: &MigrateConfig,
    documents: &dyn DocumentStore,
    objects: &dyn ObjectStore,
) -> Result<RunOutcome> {
    let posts = extract(config).await?;
    if config.dry_run {
        return Ok(RunOutcome::DryRun(DryRunSummary::build(
            &config.years,
            &posts,
            &config.layout,
        )));
    }
    migrate_posts(config, &posts, documents, objects).await
}

async fn migrate_posts(
    config: &MigrateConfig,
    posts: &[LegacyPost],
    documents: &dyn DocumentStore,
    objects: &dyn ObjectStore,
) -> Result<RunOutcome> {
    let mut migrator = Migrator::new(
        documents,
        objects,
        &config.layout,
        &config.author,
        config.overwrite,
    );
    let stats = migrator.run(posts).await?;
    Ok(RunOutcome::Migrated(stats))
}
