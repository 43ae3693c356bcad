use crate::config::Config;
use crate::fs::remove_existing;
use crate::{first_failure, git, SyncResult, COMPONENTS};
use futures::future::join_all;
use log::info;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tokio::fs::create_dir_all;

/// Replaces the three working directories with fresh clones of the
/// forks. Every removal is attempted before anything gets cloned and
/// nothing is cloned when one of them failed
pub async fn run(config: &Config) -> SyncResult<()> {
    reset_with(config, |directory| async move { remove_existing(&directory).await }).await
}

/// Reset using `remove` to delete each directory. `remove` returns
/// whether something was there to delete
pub(crate) async fn reset_with<F, Fut>(config: &Config, mut remove: F) -> SyncResult<()>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = io::Result<bool>>,
{
    info!("Starting reset action...");

    let mut removals = Vec::with_capacity(COMPONENTS.len());
    for component in COMPONENTS {
        let directory = config.component_dir(component);
        let removed = remove(directory.clone()).await;
        if let Ok(true) = removed {
            info!("Removed {directory:?}");
        }
        removals.push(removed.map(|_| ()));
    }
    first_failure(removals)?;

    create_dir_all(&config.root).await?;
    let clones = join_all(COMPONENTS.iter().map(|component| {
        let url = config.fork_url(*component);
        async move { git::clone(&config.root, &url, component.name).await }
    }))
    .await;
    first_failure(clones)?;

    info!("Finished reset");
    Ok(())
}
