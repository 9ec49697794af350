//! One-shot export of the chats visible to the session.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{messaging::types::Dialog, Result};

/// File name used for an account's export: `chats_of_<account>.txt`.
pub fn export_path(dir: &Path, account: &str) -> PathBuf {
    let safe: String = account
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("chats_of_{safe}.txt"))
}

/// Overwrite `path` with one `<id>\t<title>` line per dialog.
pub fn write_export(path: &Path, dialogs: &[Dialog]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for d in dialogs {
        // Titles are free text; keep one record per line.
        let title = d.title.replace(['\t', '\n', '\r'], " ");
        writeln!(file, "{}\t{}", d.chat_id, title)?;
    }
    Ok(())
}
