//! Input file discovery.

use std::path::{Path, PathBuf};

use crate::error::{TransformError, TransformResult};

/// Files in `dir` whose names match the glob `pattern`, sorted by path.
pub fn discover(dir: impl AsRef<Path>, pattern: &str) -> TransformResult<Vec<PathBuf>> {
    let full = dir.as_ref().join(pattern);
    let full = full.to_string_lossy();
    let entries = glob::glob(&full)
        .map_err(|e| TransformError::config(format!("invalid file pattern '{pattern}': {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TransformError::Io(e.into()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    log::info!("found {} files matching {} in {}", files.len(), pattern, dir.as_ref().display());
    Ok(files)
}

/// Interaction type encoded as the file name prefix, e.g. `IM` for `IM_2018-02-10_contacts.txt`.
pub fn interaction_type(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (prefix, _) = name.split_once('_')?;
    (!prefix.is_empty()).then(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::{discover, interaction_type};
    use std::fs;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn discovers_matching_files_sorted() {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("icescape-etl-discover-{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        for name in ["IM_2018-02-11_contacts.txt", "IM_2018-02-10_contacts.txt", "77_data.txt"] {
            fs::write(dir.join(name), "[]").unwrap();
        }

        let found = discover(&dir, "*_contacts.txt").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["IM_2018-02-10_contacts.txt", "IM_2018-02-11_contacts.txt"]);
        assert_eq!(discover(&dir, "*_data.txt").unwrap().len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn interaction_type_from_prefix() {
        assert_eq!(interaction_type(Path::new("/x/IM_2018-02-10_contacts.txt")), Some("IM".into()));
        assert_eq!(interaction_type(Path::new("contacts.txt")), None);
    }
}
