use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::Result;

/// Substituted for the signature when it can be neither read nor stored
pub const SIGNATURE_ERROR: &str = "siggenerror";

const CONFIG_DIR_NAME: &str = "checkpoint";

/// Durable, anonymous per-installation identifier kept in a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStore {
    path: Option<PathBuf>,
}

impl SignatureStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store with no location. Every signature it hands out is the sentinel.
    pub const fn unavailable() -> Self {
        Self { path: None }
    }

    /// Resolve `<config-dir>/<product>.sig`, creating the directory if
    /// needed. Falls back to `<home>/.<product>.sig` when the directory
    /// cannot be created, and to [`Self::unavailable`] when there is no home
    /// directory either.
    pub async fn for_product(product: &str, config_dir: Option<&Path>) -> Self {
        let dir = config_dir.map(Path::to_path_buf).or_else(|| {
            dirs::config_dir()
                .or_else(dirs::home_dir)
                .map(|dir| dir.join(CONFIG_DIR_NAME))
        });
        Self::resolve(product, dir, dirs::home_dir()).await
    }

    async fn resolve(product: &str, dir: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            match create_private_dir(&dir).await {
                Ok(()) => return Self::at(dir.join(format!("{product}.sig"))),
                Err(e) => tracing::debug!("Cannot create {}: {}", dir.display(), e),
            }
        }

        match home {
            Some(home) => Self::at(home.join(format!(".{product}.sig"))),
            None => {
                tracing::debug!("No directory to keep the {} signature in", product);
                Self::unavailable()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Return the stored signature, generating and persisting a new one when
    /// the file is missing, empty or unreadable.
    pub async fn load_or_create(&self) -> Result<String> {
        let Some(path) = self.path() else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no signature location").into());
        };

        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let signature = contents.trim();
                if !signature.is_empty() {
                    return Ok(signature.to_string());
                }
            }
            Err(e) => {
                tracing::debug!("No signature at {}: {}", path.display(), e);
            }
        }

        let signature = generate_signature();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent).await?;
        }
        tokio::fs::write(path, format!("{signature}\n")).await?;
        tracing::debug!("Created signature file {}", path.display());

        Ok(signature)
    }

    /// Like [`Self::load_or_create`], but never fails
    pub async fn signature_or_sentinel(&self) -> String {
        match self.load_or_create().await {
            Ok(signature) => signature,
            Err(e) => {
                tracing::debug!("Signature unavailable, using sentinel: {}", e);
                SIGNATURE_ERROR.to_string()
            }
        }
    }
}

pub fn generate_signature() -> String {
    Uuid::new_v4().to_string()
}

async fn create_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}
