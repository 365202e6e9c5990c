//! Integrity pre-checks performed before Stage 1 (spec.md §4.1): path
//! exists, directory extension is the expected sentinel, required system
//! sub-artifacts are present, and the selected driver is ours (not a
//! generic fallback).

use std::path::Path;

use crate::error::Error;

/// Marker file our `ShapefileDirSource` convention requires alongside the
/// per-layer `.shp`/`.dbf`/`.prj` triplets, so a bare directory of shapefiles
/// dropped in by accident is reported as `UnsupportedDriver` rather than
/// silently accepted.
pub const SENTINEL_FILE: &str = ".geoqc-source";

pub fn check(path: &Path) -> Result<(), Error> {
    if !path.exists() {
        return Err(Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(Error::UnsupportedDriver(format!(
            "{} is not a directory-of-shapefiles source",
            path.display()
        )));
    }
    let sentinel = path.join(SENTINEL_FILE);
    if !sentinel.exists() {
        return Err(Error::UnsupportedDriver(format!(
            "{} is missing the {} sentinel; refusing to fall back to a generic reader",
            path.display(),
            SENTINEL_FILE
        )));
    }

    let entries = std::fs::read_dir(path).map_err(Error::Io)?;
    let mut shp_stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Error::Io)?;
        let file_path = entry.path();
        if file_path.extension().and_then(|e| e.to_str()) == Some("shp") {
            if let Some(stem) = file_path.file_stem().and_then(|s| s.to_str()) {
                shp_stems.push(stem.to_string());
            }
        }
    }

    for stem in &shp_stems {
        let dbf = path.join(format!("{stem}.dbf"));
        if !dbf.exists() {
            return Err(Error::Corrupt {
                path: path.display().to_string(),
                detail: format!("layer '{stem}' has a .shp with no matching .dbf"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_path_is_path_not_found() {
        let err = check(Path::new("/no/such/path/at/all")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn directory_without_sentinel_is_unsupported_driver() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(dir.path()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDriver(_)));
    }

    #[test]
    fn shp_without_dbf_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SENTINEL_FILE), "").unwrap();
        fs::write(dir.path().join("tn_buld.shp"), "").unwrap();
        let err = check(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn well_formed_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SENTINEL_FILE), "").unwrap();
        fs::write(dir.path().join("tn_buld.shp"), "").unwrap();
        fs::write(dir.path().join("tn_buld.dbf"), "").unwrap();
        assert!(check(dir.path()).is_ok());
    }
}
