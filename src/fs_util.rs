use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::Serialize;

use crate::app::ProgressSink;
use crate::domain::EntryKind;
use crate::error::KiraError;

/// Entries of `kind` directly inside `directory` whose name starts with any of
/// `prefixes` and ends with any of `suffixes`. A `None` filter matches every
/// name. Order follows the directory listing.
pub fn list_entries(
    directory: &Path,
    kind: EntryKind,
    prefixes: Option<&[&str]>,
    suffixes: Option<&[&str]>,
) -> Result<Vec<PathBuf>, KiraError> {
    let entries = fs::read_dir(directory).map_err(|err| {
        KiraError::Filesystem(format!("list {}: {err}", directory.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let matches_kind = match kind {
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        };
        if !matches_kind {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let prefix_ok = prefixes.is_none_or(|set| set.iter().any(|p| name.starts_with(*p)));
        let suffix_ok = suffixes.is_none_or(|set| set.iter().any(|s| name.ends_with(*s)));
        if prefix_ok && suffix_ok {
            paths.push(path);
        }
    }
    Ok(paths)
}

pub fn get_file_paths(
    directory: &Path,
    prefixes: Option<&[&str]>,
    suffixes: Option<&[&str]>,
) -> Result<Vec<PathBuf>, KiraError> {
    list_entries(directory, EntryKind::File, prefixes, suffixes)
}

pub fn get_dir_paths(
    directory: &Path,
    prefixes: Option<&[&str]>,
    suffixes: Option<&[&str]>,
) -> Result<Vec<PathBuf>, KiraError> {
    list_entries(directory, EntryKind::Dir, prefixes, suffixes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDirAction {
    Created,
    Kept,
    Cleared,
}

/// Prepares `output` for writing.
///
/// A missing directory is created with its parents. An existing one is an
/// [`KiraError::OutputDirExists`] error unless `force` is set, in which case
/// its contents are kept (`nodelete`) or removed.
pub fn make_output_directory(
    output: &Path,
    force: bool,
    nodelete: bool,
    sink: &dyn ProgressSink,
) -> Result<OutputDirAction, KiraError> {
    if !output.exists() {
        fs::create_dir_all(output).map_err(|err| {
            KiraError::Filesystem(format!("create {}: {err}", output.display()))
        })?;
        sink.info(&format!("built output directory: {}", output.display()));
        return Ok(OutputDirAction::Created);
    }

    if !force {
        sink.warning(&format!(
            "output directory {} exists and force is not set, cannot write to it",
            output.display()
        ));
        return Err(KiraError::OutputDirExists(output.to_path_buf()));
    }

    if nodelete {
        sink.warning(&format!(
            "output directory {} exists, nodelete is set; adding output to it",
            output.display()
        ));
        return Ok(OutputDirAction::Kept);
    }

    sink.warning(&format!(
        "output directory {} exists; deleting its current content",
        output.display()
    ));
    fs::remove_dir_all(output)
        .map_err(|err| KiraError::Filesystem(format!("clear {}: {err}", output.display())))?;
    fs::create_dir_all(output)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", output.display())))?;
    Ok(OutputDirAction::Cleared)
}

/// Decompresses a gzip file to nowhere, failing on truncation or corruption.
pub fn validate_gzip(path: &Path) -> Result<u64, KiraError> {
    let file = fs::File::open(path)
        .map_err(|err| KiraError::Filesystem(format!("open gzip {}: {err}", path.display())))?;
    let mut decoder = MultiGzDecoder::new(io::BufReader::new(file));
    io::copy(&mut decoder, &mut io::sink())
        .map_err(|err| KiraError::Filesystem(format!("corrupt gzip {}: {err}", path.display())))
}
