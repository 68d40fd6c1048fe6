use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Notation, RunError};

/// Deterministic response path:
/// `<outputs>/<provider>/<dataset>_<file_id>_<notation>_<context|nocontext>.txt`.
/// The dataset prefix is omitted when the dataset name is empty.
pub fn output_path(
    outputs_dir: &Path,
    provider_label: &str,
    dataset: &str,
    file_id: &str,
    notation: Notation,
    context: bool,
) -> PathBuf {
    let context_flag = if context { "context" } else { "nocontext" };
    let dataset_prefix = if dataset.is_empty() {
        String::new()
    } else {
        format!("{dataset}_")
    };
    outputs_dir.join(provider_label).join(format!(
        "{dataset_prefix}{file_id}_{}_{context_flag}.txt",
        notation.name()
    ))
}

/// Companion metadata file next to a response: `<name>.input.json`.
pub fn bundle_path(response_path: &Path) -> PathBuf {
    response_path.with_extension("input.json")
}

/// Write `contents` to `path` through a sibling `.tmp` file and a rename, so
/// a concurrently running batch never observes a half-written response.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), RunError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            RunError::internal(format!(
                "failed to create output directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, contents)
        .map_err(|err| RunError::internal(format!("failed to write {}: {err}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|err| {
        RunError::internal(format!(
            "failed to move {} into place: {err}",
            tmp.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{bundle_path, output_path};
    use crate::domain::Notation;

    #[test]
    fn output_path_encodes_all_run_parameters() {
        let path = output_path(
            Path::new("outputs"),
            "claude",
            "fux-counterpoint",
            "Q1a",
            Notation::Abc,
            true,
        );
        assert_eq!(
            path,
            Path::new("outputs/claude/fux-counterpoint_Q1a_abc_context.txt")
        );
    }

    #[test]
    fn output_path_omits_empty_dataset_prefix() {
        let path = output_path(
            Path::new("outputs"),
            "chatgpt",
            "",
            "Q2b",
            Notation::Humdrum,
            false,
        );
        assert_eq!(path, Path::new("outputs/chatgpt/Q2b_humdrum_nocontext.txt"));
    }

    #[test]
    fn bundle_path_keeps_dots_inside_the_file_id() {
        let response = output_path(
            Path::new("outputs"),
            "chatgpt",
            "fux",
            "Q1.a",
            Notation::Abc,
            false,
        );
        assert_eq!(
            response,
            Path::new("outputs/chatgpt/fux_Q1.a_abc_nocontext.txt")
        );
        assert_eq!(
            bundle_path(&response),
            Path::new("outputs/chatgpt/fux_Q1.a_abc_nocontext.input.json")
        );
    }

    #[test]
    fn bundle_path_sits_next_to_the_response() {
        let bundle = bundle_path(Path::new("outputs/gemini/fux_Q1a_abc_context.txt"));
        assert_eq!(
            bundle,
            Path::new("outputs/gemini/fux_Q1a_abc_context.input.json")
        );
    }
}
