use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::app::RunResult;
use crate::domain::DocumentSet;
use crate::error::DumpError;

pub fn batch_file_name(prefix: &str, start: usize, end: usize) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{prefix}_{start}_{end}.json"))
}

pub fn write_document_set(path: &Utf8Path, set: &DocumentSet) -> Result<(), DumpError> {
    write_json_atomic(path, set)
}

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Utf8Path, value: &T) -> Result<(), DumpError> {
    let sorted =
        serde_json::to_value(value).map_err(|err| DumpError::Filesystem(err.to_string()))?;
    let mut content =
        serde_json::to_vec_pretty(&sorted).map_err(|err| DumpError::Filesystem(err.to_string()))?;
    content.push(b'\n');

    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("ipr-ebisearch")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| DumpError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| DumpError::Filesystem(format!("write {path}: {err}")))?;
    Ok(())
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
