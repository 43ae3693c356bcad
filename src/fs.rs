use log::debug;
use std::io;
use std::path::Path;
use tokio::fs::{remove_dir_all, remove_file, symlink_metadata};

/// Removes any existing file or directory tree at the provided
/// path asynchronously. A missing path is not an error, the
/// returned value tells whether anything was removed
pub async fn remove_existing(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let metadata = match symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        remove_dir_all(path).await?;
    } else {
        remove_file(path).await?;
    }
    debug!("Removed {path:?}");
    Ok(true)
}

#[cfg(test)]
mod test {
    use crate::fs::remove_existing;
    use std::io;

    #[tokio::test]
    async fn missing_path_is_not_an_error() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(!remove_existing(dir.path().join("deno")).await?);
        Ok(())
    }

    #[tokio::test]
    async fn removes_directory_trees_and_files() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let tree = dir.path().join("deno_ast");
        std::fs::create_dir_all(tree.join("src"))?;
        std::fs::write(tree.join("src").join("lib.rs"), "")?;
        let file = dir.path().join("deno_lint");
        std::fs::write(&file, "not a checkout")?;

        assert!(remove_existing(&tree).await?);
        assert!(remove_existing(&file).await?);
        assert!(!tree.exists());
        assert!(!file.exists());
        Ok(())
    }
}
