use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::options::ConvertOptions;

/// What the user asked to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSelection {
    SingleFile(PathBuf),
    Folder(PathBuf),
    Invalid(UsageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    Missing,
    Both,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Please supply a file or a folder."),
            Self::Both => write!(f, "Please only supply a file OR a folder. Not both."),
        }
    }
}

/// Turn the optional file and folder arguments into a selection. Exactly
/// one of them must be given.
pub fn resolve(file: Option<PathBuf>, folder: Option<PathBuf>) -> InputSelection {
    match (file, folder) {
        (Some(file), None) => InputSelection::SingleFile(file),
        (None, Some(folder)) => InputSelection::Folder(folder),
        (None, None) => InputSelection::Invalid(UsageError::Missing),
        (Some(_), Some(_)) => InputSelection::Invalid(UsageError::Both),
    }
}

/// Track files to convert for a valid selection, in directory-listing order
/// for folders. An invalid selection yields nothing.
pub fn track_files(selection: &InputSelection, opts: &ConvertOptions) -> Result<Vec<PathBuf>> {
    match selection {
        InputSelection::SingleFile(file) => Ok(vec![file.clone()]),
        InputSelection::Folder(folder) => track_files_in_folder(folder, opts),
        InputSelection::Invalid(_) => Ok(Vec::new()),
    }
}

/// Immediate entries of `folder` whose name ends with the track extension.
/// Subfolders are not searched.
pub fn track_files_in_folder(folder: &Path, opts: &ConvertOptions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if opts.matches_extension(&entry.file_name().to_string_lossy()) {
            files.push(folder.join(entry.file_name()));
        }
    }
    Ok(files)
}
