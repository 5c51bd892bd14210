//! Loading probe definitions from the configuration directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

use super::{parse_http_definition, parse_mysql_definition, HttpProbe, MysqlProbe, Probe, ProbeSettings};

/// Configured probes keyed by service name.
pub type ProbeSet = BTreeMap<String, Arc<dyn Probe>>;

/// Definition loading errors.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk config directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid definition {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Build one probe per `.http` / `.mysql` file found below `dir`.
///
/// The service name is the file name up to its first dot. A missing
/// directory is created and yields an empty probe set.
pub fn load_probes(dir: &Path, settings: ProbeSettings) -> Result<ProbeSet, DefinitionError> {
    fs::create_dir_all(dir).map_err(|source| DefinitionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut probes = ProbeSet::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext @ ("http" | "mysql")) => ext,
            _ => continue,
        };

        let name = service_name(path);
        if name.is_empty() {
            return Err(DefinitionError::Parse {
                path: path.to_path_buf(),
                reason: "file name gives an empty service name".to_string(),
            });
        }

        let content = fs::read_to_string(path)
            .map_err(|source| DefinitionError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .replace("\r\n", "\n");

        let parse_err = |reason: String| DefinitionError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let probe: Arc<dyn Probe> = match ext {
            "http" => {
                let request = parse_http_definition(&content).map_err(parse_err)?;
                let probe = HttpProbe::new(request, settings).map_err(|e| parse_err(e.to_string()))?;
                Arc::new(probe)
            }
            _ => {
                let address = parse_mysql_definition(&content).map_err(parse_err)?;
                Arc::new(MysqlProbe::new(address, settings))
            }
        };

        if probes.insert(name.clone(), probe).is_some() {
            tracing::warn!("Duplicate definition for {}, using {}", name, path.display());
        }
    }

    Ok(probes)
}

fn service_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}
