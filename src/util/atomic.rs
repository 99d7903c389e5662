use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Atomically replace `dst` with `content` using write-to-temp-then-rename.
///
/// The temp file lives next to `dst` so the rename stays on one filesystem.
/// Readers of `dst` see either the old bytes or the new bytes, never a
/// partial write.
pub fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    // Randomized temp name so a stale temp file from a crashed run can't collide
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;

    let result = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}
