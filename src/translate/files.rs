//! Present the agent's workspace files as OpenAI file objects.
//!
//! File ids are `file-` followed by the URL-safe base64 of the workspace path,
//! so an id can be turned back into a filename without another backend call.
//! The agent reports no sizes; `bytes` is always 0.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use super::openai_types::{FileList, FileObject};

const FILE_ID_PREFIX: &str = "file-";
const PURPOSE: &str = "retrieval";

/// Whether a workspace path should be listed: dependency trees, VCS
/// metadata and dotfiles are skipped.
pub fn is_listable(path: &str) -> bool {
    !path.contains("node_modules/") && !path.contains(".git/") && !path.starts_with('.')
}

pub fn file_id_for_path(path: &str) -> String {
    format!("{FILE_ID_PREFIX}{}", URL_SAFE_NO_PAD.encode(path))
}

pub fn path_from_file_id(id: &str) -> Option<String> {
    let encoded = id.strip_prefix(FILE_ID_PREFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn file_object_for_path(path: &str, created_at: i64) -> FileObject {
    FileObject {
        id: file_id_for_path(path),
        object: "file".to_string(),
        bytes: 0,
        created_at,
        filename: file_name(path).to_string(),
        purpose: PURPOSE.to_string(),
    }
}

/// Describe a file by id alone. Ids that do not decode get a synthetic name.
pub fn file_object_for_id(id: &str, created_at: i64) -> FileObject {
    let filename = match path_from_file_id(id) {
        Some(path) => file_name(&path).to_string(),
        None => format!("file-{id}"),
    };

    FileObject {
        id: id.to_string(),
        object: "file".to_string(),
        bytes: 0,
        created_at,
        filename,
        purpose: PURPOSE.to_string(),
    }
}

pub fn file_list(paths: &[String], created_at: i64) -> FileList {
    FileList {
        object: "list".to_string(),
        data: paths
            .iter()
            .filter(|p| is_listable(p))
            .map(|p| file_object_for_path(p, created_at))
            .collect(),
    }
}
