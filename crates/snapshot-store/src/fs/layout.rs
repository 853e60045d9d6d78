use std::path::{Path, PathBuf};

const ENTRY_EXT: &str = "json";

/// File holding the serialized entry stored under `key`.
pub fn entry_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{}.{ENTRY_EXT}", sanitize(key)))
}

/// Key encoded in an entry file name, if the file is one of ours.
pub fn key_from_path(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != ENTRY_EXT {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
