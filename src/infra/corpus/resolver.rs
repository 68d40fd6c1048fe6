use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{Notation, RunError};
use crate::infra::corpus::layout::CorpusLayout;

/// One guide document, kept with its file stem so metadata bundles can name
/// which guides went into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guide {
    pub name: String,
    pub text: String,
}

/// Where a question prompt was found. Consolidated datasets carry one shared
/// `prompt.md`; legacy datasets keep one file per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Consolidated,
    PerQuestion,
}

/// Read a UTF-8 text file and return its trimmed contents.
pub fn load_text_file(path: &Path) -> Result<String, RunError> {
    if !path.is_file() {
        return Err(RunError::missing_resource(format!(
            "expected file at {} but none was found",
            path.display()
        )));
    }
    let contents = fs::read_to_string(path).map_err(|err| read_failure(path, &err))?;
    Ok(contents.trim().to_string())
}

/// Locate the encoded file for `file_id` in `dir`: exact `<id><ext>` first,
/// then the lexically first file whose name ends with `<id><ext>`.
pub fn find_encoded_file(
    dir: &Path,
    file_id: &str,
    notation: Notation,
    required: bool,
) -> Result<Option<PathBuf>, RunError> {
    let suffix = format!("{file_id}{}", notation.extension());
    let exact = dir.join(&suffix);
    if exact.is_file() {
        return Ok(Some(exact));
    }
    if let Some(found) = first_match(dir, |name| name.ends_with(&suffix))? {
        return Ok(Some(found));
    }
    if required {
        return Err(RunError::missing_resource(format!(
            "no encoded file for '{file_id}' matching '*{suffix}' in {}",
            dir.display()
        )));
    }
    Ok(None)
}

/// Resolve and load the encoded source, trying the current layout
/// `encoded/<notation>/` before the legacy `encoded/<exam_date>/<notation>/`.
pub fn load_encoded(
    layout: &CorpusLayout,
    file_id: &str,
    notation: Notation,
    exam_date: Option<&str>,
) -> Result<(String, PathBuf), RunError> {
    let current_dir = layout.encoded_dir.join(notation.name());
    let mut searched = vec![current_dir.display().to_string()];

    if let Some(path) = find_encoded_file(&current_dir, file_id, notation, false)? {
        return Ok((load_text_file(&path)?, path));
    }
    if let Some(exam) = exam_date {
        let legacy_dir = layout.encoded_dir.join(exam).join(notation.name());
        searched.push(legacy_dir.display().to_string());
        if let Some(path) = find_encoded_file(&legacy_dir, file_id, notation, false)? {
            return Ok((load_text_file(&path)?, path));
        }
    }
    Err(RunError::missing_resource(format!(
        "no encoded file for '{file_id}' with extension '{}'; searched: {}",
        notation.extension(),
        searched.join(", ")
    )))
}

/// Locate the question prompt for `file_id` in a legacy per-question
/// directory: exact `<id>.<context|nocontext>.txt` first, then the lexically
/// first `*<id>*<Context|NoContext>Prompt.txt` match.
pub fn find_question_file(
    dir: &Path,
    file_id: &str,
    context: bool,
) -> Result<Option<PathBuf>, RunError> {
    let suffix = if context { "context" } else { "nocontext" };
    let exact = dir.join(format!("{file_id}.{suffix}.txt"));
    if exact.is_file() {
        return Ok(Some(exact));
    }
    let found = first_match(dir, |name| {
        if !name.contains(file_id) {
            return false;
        }
        if context {
            name.ends_with("ContextPrompt.txt") && !name.ends_with("NoContextPrompt.txt")
        } else {
            name.ends_with("NoContextPrompt.txt")
        }
    })?;
    Ok(found)
}

/// Resolve and load the question text. A consolidated `prompts/prompt.md`
/// wins over the legacy per-question tree.
pub fn load_question(
    layout: &CorpusLayout,
    file_id: &str,
    notation: Notation,
    context: bool,
) -> Result<(String, PathBuf, QuestionSource), RunError> {
    let consolidated = layout.prompts_dir.join("prompt.md");
    if consolidated.is_file() {
        return Ok((
            load_text_file(&consolidated)?,
            consolidated,
            QuestionSource::Consolidated,
        ));
    }
    let legacy_dir = layout.questions_dir(context, notation);
    match find_question_file(&legacy_dir, file_id, context)? {
        Some(path) => Ok((load_text_file(&path)?, path, QuestionSource::PerQuestion)),
        None => Err(RunError::missing_resource(format!(
            "no question prompt for '{file_id}' (context={context}) in {}",
            legacy_dir.display()
        ))),
    }
}

/// Load the format intro `base/base_<notation>.md`, falling back to `.txt`.
pub fn load_base_prompt(layout: &CorpusLayout, notation: Notation) -> Result<String, RunError> {
    let base_dir = layout.base_dir();
    for ext in ["md", "txt"] {
        let candidate = base_dir.join(format!("base_{}.{ext}", notation.name()));
        if candidate.is_file() {
            return load_text_file(&candidate);
        }
    }
    Err(RunError::missing_resource(format!(
        "no base format prompt for '{}' in {}",
        notation.name(),
        base_dir.display()
    )))
}

/// Load `base/system_prompt.txt`, or the layout's configured fallback when
/// the corpus does not carry one.
pub fn load_system_prompt(layout: &CorpusLayout) -> Result<String, RunError> {
    let path = layout.base_dir().join("system_prompt.txt");
    if path.is_file() {
        return load_text_file(&path);
    }
    debug!(path = %path.display(), "no system prompt file, using fallback");
    Ok(layout.system_prompt_fallback.clone())
}

/// Load every guide document in lexical filename order. Contextless runs and
/// corpora without a guides directory yield an empty list.
pub fn load_guides(layout: &CorpusLayout, context: bool) -> Result<Vec<Guide>, RunError> {
    if !context || !layout.guides_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut guides = Vec::new();
    for path in sorted_files(&layout.guides_dir)? {
        if !matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("txt") | Some("md")
        ) {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        guides.push(Guide {
            name,
            text: load_text_file(&path)?,
        });
    }
    Ok(guides)
}

/// Unique sorted file stems across the first-level notation subdirectories.
pub fn list_file_ids(layout: &CorpusLayout) -> Result<Vec<String>, RunError> {
    if !layout.encoded_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for subdir in read_dir_entries(&layout.encoded_dir)? {
        if !subdir.is_dir() {
            continue;
        }
        for file in read_dir_entries(&subdir)? {
            if file.is_file()
                && let Some(stem) = file.file_stem().and_then(|stem| stem.to_str())
            {
                ids.push(stem.to_string());
            }
        }
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Notations with at least one encoded file present, in canonical order.
pub fn list_notations(layout: &CorpusLayout) -> Result<Vec<Notation>, RunError> {
    let mut found = Vec::new();
    for notation in Notation::ALL {
        let dir = layout.encoded_dir.join(notation.name());
        if dir.is_dir() && !sorted_files(&dir)?.is_empty() {
            found.push(notation);
        }
    }
    Ok(found)
}

/// Sorted stems of the guide documents, for `--list-guides`.
pub fn list_guide_names(layout: &CorpusLayout) -> Result<Vec<String>, RunError> {
    if !layout.guides_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for path in sorted_files(&layout.guides_dir)? {
        if !matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("txt") | Some("md")
        ) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.push(stem.to_string());
        }
    }
    Ok(names)
}

fn first_match(
    dir: &Path,
    predicate: impl Fn(&str) -> bool,
) -> Result<Option<PathBuf>, RunError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let found = sorted_files(dir)?.into_iter().find(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(&predicate)
    });
    Ok(found)
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let mut files: Vec<PathBuf> = read_dir_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn read_dir_entries(dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let entries = fs::read_dir(dir).map_err(|err| read_failure(dir, &err))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| read_failure(dir, &err))?;
        paths.push(entry.path());
    }
    Ok(paths)
}

fn read_failure(path: &Path, err: &io::Error) -> RunError {
    if err.kind() == io::ErrorKind::NotFound {
        RunError::missing_resource(format!(
            "expected file at {} but none was found",
            path.display()
        ))
    } else {
        RunError::internal(format!("failed to read {}: {err}", path.display()))
    }
}
