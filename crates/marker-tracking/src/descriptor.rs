//! NFT descriptor bundle loading

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

/// File extensions making up one NFT descriptor bundle
pub const DESCRIPTOR_EXTENSIONS: [&str; 3] = ["fset", "fset3", "iset"];

/// Descriptor loading failures. Always fatal to pipeline start.
#[derive(Error, Debug)]
pub enum DescriptorLoadError {
    #[error("Descriptor file missing: {0}")]
    Missing(PathBuf),

    #[error("Descriptor file is empty: {0}")]
    Empty(PathBuf),

    #[error("Failed to read descriptor file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Precomputed feature descriptors for one target image
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    name: String,
    /// Feature set
    pub fset: Vec<u8>,
    /// 3D feature set
    pub fset3: Vec<u8>,
    /// Image set (multi-resolution pyramid)
    pub iset: Vec<u8>,
}

impl DescriptorSet {
    /// Load `{base}.fset`, `{base}.fset3` and `{base}.iset` synchronously
    pub fn load(base: impl AsRef<Path>) -> Result<Self, DescriptorLoadError> {
        let base = base.as_ref();
        // Dots belong to the target name; extensions are appended below
        let name = base
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.display().to_string());

        info!("Loading NFT descriptors '{}' from {}", name, base.display());

        let mut parts = Vec::with_capacity(DESCRIPTOR_EXTENSIONS.len());
        for ext in DESCRIPTOR_EXTENSIONS {
            let path = with_extension(base, ext);
            let bytes = read_part(&path).map_err(|e| {
                error!("{}", e);
                e
            })?;
            parts.push(bytes);
        }

        let iset = parts.pop().unwrap_or_default();
        let fset3 = parts.pop().unwrap_or_default();
        let fset = parts.pop().unwrap_or_default();

        Ok(Self {
            name,
            fset,
            fset3,
            iset,
        })
    }

    /// Build a set from in-memory parts
    pub fn from_parts(name: &str, fset: Vec<u8>, fset3: Vec<u8>, iset: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            fset,
            fset3,
            iset,
        }
    }

    /// Target image name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total bundle size in bytes
    pub fn size_bytes(&self) -> usize {
        self.fset.len() + self.fset3.len() + self.iset.len()
    }
}

/// Append an extension without replacing dots already in the file name
fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn read_part(path: &Path) -> Result<Vec<u8>, DescriptorLoadError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DescriptorLoadError::Missing(path.to_path_buf())
        } else {
            DescriptorLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if bytes.is_empty() {
        return Err(DescriptorLoadError::Empty(path.to_path_buf()));
    }
    Ok(bytes)
}
