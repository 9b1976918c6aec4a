use log::info;
use std::io;
use std::path::{Path, PathBuf};

const WORKSPACE_DIR_NAME: &str = "dext3r";

pub fn get_default_workspace() -> io::Result<PathBuf> {
    dirs::data_dir()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system data directory",
            )
        })
        .map(|p| p.join(WORKSPACE_DIR_NAME))
}

pub async fn ensure_workspace_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Workspace path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating workspace directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}
