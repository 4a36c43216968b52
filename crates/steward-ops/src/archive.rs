//! Secure streaming tar/gzip extraction.
//!
//! Entries are written in a single forward pass over the archive. An entry
//! whose path is absolute or escapes the destination after lexical cleaning
//! is skipped and never written.

use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

use crate::error::ExtractError;

/// File name suffixes treated as gzip-compressed tarballs.
const COMPRESSED_SUFFIXES: &[&str] = &[".tgz", ".tar.gz"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extraction flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Extract even when the destination already exists.
    pub force: bool,

    /// Drop the first path segment of every entry.
    pub strip_root: bool,
}

/// Outcome of an extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Destination existed and extraction was not forced.
    pub skipped: bool,

    /// Regular files written.
    pub files: usize,

    /// Directories created.
    pub directories: usize,

    /// Entries rejected for unsafe paths.
    pub rejected: usize,

    /// Entries of unsupported types (links, devices, ...).
    pub ignored: usize,
}

/// Whether `name` carries a compressed-tarball suffix.
pub fn is_compressed(name: &str) -> bool {
    COMPRESSED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Extract the tar stream read from `reader` into `dest`.
///
/// `source_name` selects gzip decoding. Entries already written are left in
/// place when an error aborts the extraction.
pub fn extract_archive<R: Read>(
    source_name: &str,
    reader: R,
    dest: &Path,
    options: ExtractOptions,
) -> Result<ExtractSummary, ExtractError> {
    if dest.exists() && !options.force {
        tracing::info!(
            dest = %dest.display(),
            "Destination already exists, skipping extraction"
        );
        return Ok(ExtractSummary {
            skipped: true,
            ..Default::default()
        });
    }

    fs::create_dir_all(dest).map_err(|source| ExtractError::Destination {
        path: dest.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(reader);
    let gzip = if is_compressed(source_name) {
        let head = reader.fill_buf().map_err(ExtractError::Stream)?;
        if head.starts_with(&GZIP_MAGIC) {
            true
        } else {
            tracing::error!(
                source = %source_name,
                "Source is not gzip data, reading it as a plain tar stream"
            );
            false
        }
    } else {
        false
    };

    let summary = if gzip {
        unpack(Archive::new(GzDecoder::new(reader)), dest, options)?
    } else {
        unpack(Archive::new(reader), dest, options)?
    };

    tracing::info!(
        source = %source_name,
        dest = %dest.display(),
        files = summary.files,
        directories = summary.directories,
        rejected = summary.rejected,
        "Archive extracted"
    );

    Ok(summary)
}

fn unpack<R: Read>(
    mut archive: Archive<R>,
    dest: &Path,
    options: ExtractOptions,
) -> Result<ExtractSummary, ExtractError> {
    let mut summary = ExtractSummary::default();

    for entry in archive.entries().map_err(ExtractError::Stream)? {
        let mut entry = entry.map_err(ExtractError::Stream)?;
        let raw = entry.path().map_err(ExtractError::Stream)?.into_owned();

        let Some(clean) = sanitize_path(&raw) else {
            tracing::warn!(
                path = %raw.display(),
                "Path traversal attempt detected, skipping entry"
            );
            summary.rejected += 1;
            continue;
        };

        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header.mode().ok().map(|m| m & 0o7777);

        // A top-level file has no root segment to drop and keeps its name.
        let has_root = entry_type.is_dir() || clean.components().count() > 1;
        let relative = if options.strip_root && has_root {
            strip_first_segment(&clean)
        } else {
            clean
        };

        // "./" and the stripped root directory itself.
        if relative.as_os_str().is_empty() {
            if !entry_type.is_dir() {
                summary.ignored += 1;
            }
            continue;
        }

        let target = dest.join(&relative);
        tracing::debug!(target = %target.display(), "Extracting entry");

        if entry_type.is_dir() {
            if !target.exists() {
                create_dir(&target, mode.unwrap_or(0o755))?;
                summary.directories += 1;
            }
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent() {
                if !parent.exists() {
                    create_dir(parent, 0o755)?;
                }
            }
            let mut file = open_file(&target, mode.unwrap_or(0o644))?;
            io::copy(&mut entry, &mut file).map_err(|source| ExtractError::Write {
                path: target.clone(),
                source,
            })?;
            summary.files += 1;
        } else {
            tracing::debug!(
                path = %raw.display(),
                entry_type = ?entry_type,
                "Unsupported entry type, skipping"
            );
            summary.ignored += 1;
        }
    }

    Ok(summary)
}

/// Lexically clean `path`, rejecting absolute paths and paths that climb
/// above their root.
pub fn sanitize_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
            Component::Normal(part) => clean.push(part),
        }
    }
    Some(clean)
}

fn strip_first_segment(path: &Path) -> PathBuf {
    let mut components = path.components();
    components.next();
    components.as_path().to_path_buf()
}

fn create_dir(path: &Path, mode: u32) -> Result<(), ExtractError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(path).map_err(|source| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn open_file(path: &Path, mode: u32) -> Result<File, ExtractError> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    options.open(path).map_err(|source| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::{Builder, EntryType, Header};

    enum Item<'a> {
        Dir(&'a str),
        File(&'a str, &'a str),
    }

    /// Build a header with the name written verbatim, bypassing the
    /// builder's own path validation.
    fn raw_header(name: &str, size: u64, kind: EntryType, mode: u32) -> Header {
        let mut header = Header::new_gnu();
        let bytes = name.as_bytes();
        header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
        header.set_size(size);
        header.set_entry_type(kind);
        header.set_mode(mode);
        header.set_cksum();
        header
    }

    fn build_tar(items: &[Item]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for item in items {
            match item {
                Item::Dir(name) => {
                    let header = raw_header(name, 0, EntryType::Directory, 0o755);
                    builder.append(&header, io::empty()).unwrap();
                }
                Item::File(name, body) => {
                    let header =
                        raw_header(name, body.len() as u64, EntryType::Regular, 0o644);
                    builder.append(&header, body.as_bytes()).unwrap();
                }
            }
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path(Path::new("a/b/c.txt")), Some(PathBuf::from("a/b/c.txt")));
        assert_eq!(sanitize_path(Path::new("./a/./b")), Some(PathBuf::from("a/b")));
        assert_eq!(sanitize_path(Path::new("a/../b")), Some(PathBuf::from("b")));
        assert_eq!(sanitize_path(Path::new("../evil")), None);
        assert_eq!(sanitize_path(Path::new("a/../../evil")), None);
        assert_eq!(sanitize_path(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_is_compressed() {
        assert!(is_compressed("release.tgz"));
        assert!(is_compressed("https://example.com/release.tar.gz"));
        assert!(!is_compressed("release.tar"));
        assert!(!is_compressed("release.gz"));
    }

    #[test]
    fn test_extract_plain_tar() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[
            Item::Dir("app/"),
            Item::File("app/config.yml", "port: 80\n"),
            Item::File("README", "hello"),
        ]);

        let summary =
            extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(fs::read_to_string(dest.join("app/config.yml")).unwrap(), "port: 80\n");
        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "hello");
    }

    #[test]
    fn test_traversal_entries_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[
            Item::File("../evil.txt", "pwned"),
            Item::File("nested/../../evil2.txt", "pwned"),
            Item::File("/abs.txt", "pwned"),
            Item::File("fine/../ok.txt", "ok"),
        ]);

        let summary =
            extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();

        assert_eq!(summary.rejected, 3);
        assert_eq!(summary.files, 1);
        assert!(!tmp.path().join("evil.txt").exists());
        assert!(!tmp.path().join("evil2.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("ok.txt")).unwrap(), "ok");
    }

    #[test]
    fn test_strip_root() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[
            Item::Dir("a/"),
            Item::Dir("a/b/"),
            Item::File("a/b/c.txt", "content"),
        ]);
        let options = ExtractOptions {
            force: false,
            strip_root: true,
        };

        let summary = extract_archive("bundle.tar", data.as_slice(), &dest, options).unwrap();

        assert_eq!(fs::read_to_string(dest.join("b/c.txt")).unwrap(), "content");
        assert!(!dest.join("a").exists());
        assert_eq!(summary.directories, 1);
    }

    #[test]
    fn test_strip_root_keeps_top_level_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[
            Item::Dir("root/"),
            Item::File("README", "read me"),
            Item::File("root/x.txt", "x"),
        ]);
        let options = ExtractOptions {
            force: false,
            strip_root: true,
        };

        let summary = extract_archive("bundle.tar", data.as_slice(), &dest, options).unwrap();

        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "read me");
        assert_eq!(fs::read_to_string(dest.join("x.txt")).unwrap(), "x");
        assert!(!dest.join("root").exists());
        assert_eq!(summary.files, 2);
        assert_eq!(summary.ignored, 0);
    }

    #[test]
    fn test_existing_destination_requires_force() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[Item::File("file.txt", "original")]);

        let first =
            extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();
        assert!(!first.skipped);

        fs::write(dest.join("file.txt"), "changed").unwrap();

        let second =
            extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();
        assert!(second.skipped);
        assert_eq!(fs::read_to_string(dest.join("file.txt")).unwrap(), "changed");

        let forced = ExtractOptions {
            force: true,
            strip_root: false,
        };
        let third = extract_archive("bundle.tar", data.as_slice(), &dest, forced).unwrap();
        assert!(!third.skipped);
        assert_eq!(fs::read_to_string(dest.join("file.txt")).unwrap(), "original");
    }

    #[test]
    fn test_gzip_by_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = gzip(&build_tar(&[Item::File("pkg/bin.sh", "#!/bin/sh\n")]));

        let summary =
            extract_archive("pkg.tgz", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(fs::read_to_string(dest.join("pkg/bin.sh")).unwrap(), "#!/bin/sh\n");
    }

    #[test]
    fn test_plain_tar_with_gzip_suffix_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let data = build_tar(&[Item::File("a.txt", "plain")]);

        let summary =
            extract_archive("pkg.tar.gz", data.as_slice(), &dest, ExtractOptions::default())
                .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "plain");
    }

    #[test]
    fn test_corrupt_header_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let mut data = build_tar(&[Item::File("a.txt", "data")]);
        data[0] ^= 0xff;

        let result =
            extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default());
        assert!(matches!(result, Err(ExtractError::Stream(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("out");
        let mut builder = Builder::new(Vec::new());
        let header = raw_header("run.sh", 3, EntryType::Regular, 0o750);
        builder.append(&header, "ls\n".as_bytes()).unwrap();
        let data = builder.into_inner().unwrap();

        extract_archive("bundle.tar", data.as_slice(), &dest, ExtractOptions::default())
            .unwrap();

        let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750 & !current_umask());
    }

    #[cfg(unix)]
    fn current_umask() -> u32 {
        // Probe the umask through a freshly created file.
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let tmp = tempfile::tempdir().unwrap();
        let probe = tmp.path().join("probe");
        OpenOptions::new()
            .create(true)
            .write(true)
            .mode(0o777)
            .open(&probe)
            .unwrap();
        !fs::metadata(&probe).unwrap().permissions().mode() & 0o777
    }
}
