use crate::utils::error::{CohortError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};

const ARCHIVE_DIR: &str = "cql";

/// Zip archive of CQL libraries sent as the `cql_definition` part.
#[derive(Debug, Clone)]
pub struct CqlBundle {
    entries: Vec<String>,
    bytes: Vec<u8>,
}

impl CqlBundle {
    /// Packs every `.cql` file under `dir`, recursively.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        collect_cql_files(dir, &mut paths)?;

        let mut libraries = BTreeMap::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    CohortError::validation(format!("invalid CQL file name: {}", path.display()))
                })?
                .to_string();
            let contents = std::fs::read(&path)?;
            if libraries.insert(name.clone(), contents).is_some() {
                return Err(CohortError::validation(format!(
                    "duplicate CQL library file name: {}",
                    name
                )));
            }
        }

        if libraries.is_empty() {
            return Err(CohortError::validation(format!(
                "no .cql files found in {}",
                dir.display()
            )));
        }

        tracing::debug!("Packing {} CQL file(s) from {}", libraries.len(), dir.display());
        Self::pack(libraries)
    }

    pub fn from_files<N: AsRef<str>, C: AsRef<[u8]>>(files: &[(N, C)]) -> Result<Self> {
        if files.is_empty() {
            return Err(CohortError::validation("a CQL bundle needs at least one library"));
        }
        let mut libraries = BTreeMap::new();
        for (name, contents) in files {
            let name = name.as_ref().to_string();
            if libraries
                .insert(name.clone(), contents.as_ref().to_vec())
                .is_some()
            {
                return Err(CohortError::validation(format!(
                    "duplicate CQL library file name: {}",
                    name
                )));
            }
        }
        Self::pack(libraries)
    }

    fn pack(libraries: BTreeMap<String, Vec<u8>>) -> Result<Self> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let mut entries = Vec::with_capacity(libraries.len());

        for (name, contents) in libraries {
            let entry = format!("{}/{}", ARCHIVE_DIR, name);
            zip.start_file::<_, ()>(entry.as_str(), FileOptions::default())?;
            zip.write_all(&contents)?;
            entries.push(entry);
        }

        let bytes = zip.finish()?.into_inner();
        Ok(Self { entries, bytes })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn collect_cql_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_cql_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cql"))
        {
            out.push(path);
        }
    }
    Ok(())
}
