//! Zip implementation of [`Archive`]

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::archive::{Archive, ExtractError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl Archive for ZipExtractor {
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<(), ExtractError> {
        let file = File::open(archive_path).map_err(|source| ExtractError::Open {
            path: archive_path.to_path_buf(),
            source,
        })?;

        let corrupt = |e: zip::result::ZipError| ExtractError::Corrupt {
            path: archive_path.to_path_buf(),
            message: e.to_string(),
        };
        let mut archive = zip::ZipArchive::new(file).map_err(corrupt)?;

        fs::create_dir_all(destination).map_err(|source| write_error(destination, source))?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(corrupt)?;

            let Some(relative) = entry.enclosed_name() else {
                warn!("Skipping zip entry with unsafe path: {}", entry.name());
                continue;
            };
            let out_path = destination.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|source| write_error(&out_path, source))?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
                }
                let mut out_file =
                    File::create(&out_path).map_err(|source| write_error(&out_path, source))?;
                io::copy(&mut entry, &mut out_file).map_err(|source| {
                    // Decompression failures surface as io errors from the entry reader
                    if source.kind() == io::ErrorKind::InvalidData {
                        ExtractError::Corrupt {
                            path: archive_path.to_path_buf(),
                            message: source.to_string(),
                        }
                    } else {
                        write_error(&out_path, source)
                    }
                })?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&out_path, fs::Permissions::from_mode(mode)).ok();
                }
            }

            debug!("Extracted {:?}", out_path);
        }

        info!(
            "Extracted {} entries from {:?} into {:?}",
            archive.len(),
            archive_path,
            destination
        );
        Ok(())
    }
}

fn write_error(path: &Path, source: io::Error) -> ExtractError {
    ExtractError::Write {
        path: path.to_path_buf(),
        source,
    }
}
