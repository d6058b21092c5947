//! Non-blocking lock probe for embedded dictionary files

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use fs2::FileExt;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use vuls_core::{DictionaryKind, HealthReport, HealthStatus};

/// Probe whether `path` could be opened under an exclusive lock right now.
///
/// Two locks are checked: the advisory file lock another server holds for
/// its whole lifetime, then SQLite's own database lock held by a process
/// writing the file (a dictionary fetch, say). Both are released before
/// returning. A contended lock is reported as
/// [`HealthStatus::LockedByOtherProcess`]; a missing file, bad permissions
/// or a directory is [`HealthStatus::OpenError`]. Whether the file is a
/// usable dictionary is left to the durable open.
pub fn check_lock(kind: DictionaryKind, path: &Path) -> HealthReport {
    let target = path.display().to_string();

    let file = match open_regular_file(path) {
        Ok(file) => file,
        Err(e) => {
            return HealthReport::new(kind, target, HealthStatus::OpenError, e.to_string());
        }
    };

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
        }
        Err(e) if is_contended(&e) => {
            return HealthReport::new(
                kind,
                target,
                HealthStatus::LockedByOtherProcess,
                "exclusive lock is held by another process",
            )
        }
        Err(e) => return HealthReport::new(kind, target, HealthStatus::OpenError, e.to_string()),
    }

    match try_database_lock(path) {
        Err(e) if is_busy(&e) => HealthReport::new(
            kind,
            target,
            HealthStatus::LockedByOtherProcess,
            format!("database lock is held by another connection: {}", e),
        ),
        _ => {
            tracing::debug!(kind = %kind, path = %target, "Embedded dictionary is not locked");
            HealthReport::new(kind, target, HealthStatus::Reachable, "not locked")
        }
    }
}

/// Take and drop SQLite's write lock, falling back to a read on files this
/// process may not write. Waits for nothing.
fn try_database_lock(path: &Path) -> rusqlite::Result<()> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(Duration::ZERO)?;

    match conn.execute_batch("BEGIN IMMEDIATE; ROLLBACK;") {
        Err(e) if e.sqlite_error_code() == Some(ErrorCode::ReadOnly) => {}
        other => other?,
    }
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(())
}

/// SQLite refused a lock held by another connection
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Open `path` read-only, rejecting directories
pub(crate) fn open_regular_file(path: &Path) -> io::Result<File> {
    let file = File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::Other, "is a directory"));
    }
    Ok(file)
}

pub(crate) fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
