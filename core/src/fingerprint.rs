use sha1::{Digest, Sha1};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 8192;

/// Computes the SHA-1 content fingerprint of the file at `path` as a
/// lowercase hex string, reading in fixed-size chunks.
pub fn sha1_fingerprint(path: &Path) -> Result<String, FingerprintError> {
    let mut file = File::open(path).map_err(|source| FingerprintError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|source| FingerprintError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-1 of an in-memory buffer, in the same hex form as [`sha1_fingerprint`].
pub fn sha1_of_bytes(contents: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(contents);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub enum FingerprintError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl Display for FingerprintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
        }
    }
}

impl Error for FingerprintError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}
