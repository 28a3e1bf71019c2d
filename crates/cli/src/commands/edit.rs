use crate::commands::{export, import};
use crate::context::Context;
use stagecrypt_core::{Error, Result, DEFAULT_EDITOR, EDIT_TEMP_FILE};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// What to do with a temp file left by an interrupted session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Continue,
    Abort,
}

pub fn execute(context: &Context, json: bool, editor: Option<String>) -> Result<()> {
    let temp_path = temp_path(&context.config_path);
    let mut skip_export = false;

    if temp_path.exists() {
        match ask_resume()? {
            Resume::Continue => skip_export = true,
            Resume::Abort => fs::remove_file(&temp_path)
                .map_err(|e| Error::file_system(&temp_path, "remove", e))?,
        }
    }

    if !skip_export {
        let text = export::export_text(context, json)?;
        fs::write(&temp_path, text).map_err(|e| Error::file_system(&temp_path, "write", e))?;
    }

    let editor = editor_command(editor);
    run_editor(&editor, &temp_path)?;

    let edited =
        fs::read_to_string(&temp_path).map_err(|e| Error::file_system(&temp_path, "read", e))?;
    // On failure the temp file stays behind so the session can be continued
    import::import_text(context, &edited)?;

    fs::remove_file(&temp_path).map_err(|e| Error::file_system(&temp_path, "remove", e))?;
    Ok(())
}

fn temp_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name(EDIT_TEMP_FILE)
}

fn ask_resume() -> Result<Resume> {
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    loop {
        write!(
            stderr,
            "A previously interrupted edit session was found. Do you want to (C)ontinue that session or (A)bort it? "
        )
        .and_then(|()| stderr.flush())
        .map_err(|e| Error::editor(format!("failed to prompt: {e}")))?;

        let mut answer = String::new();
        let read = stdin
            .lock()
            .read_line(&mut answer)
            .map_err(|e| Error::editor(format!("failed to read answer: {e}")))?;
        if read == 0 {
            return Err(Error::editor(
                "an interrupted edit session exists and no answer was given",
            ));
        }
        if let Some(resume) = parse_answer(&answer) {
            return Ok(resume);
        }
    }
}

fn parse_answer(answer: &str) -> Option<Resume> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "c" | "continue" => Some(Resume::Continue),
        "a" | "abort" => Some(Resume::Abort),
        _ => None,
    }
}

fn editor_command(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("EDITOR").ok())
        .filter(|editor| !editor.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}

fn run_editor(editor: &str, path: &Path) -> Result<()> {
    let parts = shlex::split(editor)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| Error::editor(format!("invalid editor command '{editor}'")))?;
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| Error::editor(format!("invalid editor command '{editor}'")))?;

    tracing::debug!(editor = %editor, path = %path.display(), "Launching editor");
    let status = Command::new(program)
        .args(args)
        .arg(path)
        .status()
        .map_err(|e| Error::editor(format!("failed to launch '{program}': {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::editor(format!("'{editor}' exited with {status}")))
    }
}
