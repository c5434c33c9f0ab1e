//! 内容同步模块
//!
//! 在扫描前把外部编写的 Markdown 复制进内容目录。
//! 这一步的任何失败都只记录日志，不影响后续流程。

use crate::core::io::ContentIo;
use crate::core::record::is_markdown;
use std::path::Path;
use tracing::{error, info, warn};

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// 源目录不存在，未执行复制
    pub source_missing: bool,
    /// 复制成功的文件名
    pub copied: Vec<String>,
    /// 跳过的非 Markdown 文件数
    pub skipped: usize,
    /// 失败的文件名及原因
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    /// 是否有任何失败
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// 把 `source` 下的 `.md` 文件复制到 `dest`
///
/// 目标目录不存在时递归创建；同名文件直接覆盖。
/// 源目录不存在时记录警告并返回空结果。
///
/// # Arguments
///
/// * `source` - 外部 Markdown 目录
/// * `dest` - 内容目录
/// * `io` - I/O 能力
pub fn sync_content(source: &Path, dest: &Path, io: &dyn ContentIo) -> SyncReport {
    let mut report = SyncReport::default();

    if !io.exists(source) {
        warn!("External content source {:?} not found, skipping sync", source);
        report.source_missing = true;
        return report;
    }

    if let Err(e) = io.create_dir_all(dest) {
        error!("Failed to prepare {:?}: {:#}", dest, e);
        report
            .failed
            .push((dest.to_string_lossy().into_owned(), e.to_string()));
        return report;
    }

    let entries = match io.read_dir(source) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list {:?}: {:#}", source, e);
            report
                .failed
                .push((source.to_string_lossy().into_owned(), e.to_string()));
            return report;
        }
    };

    for entry in entries {
        let name = entry.file_name();
        if entry.is_dir || !is_markdown(&name) {
            report.skipped += 1;
            continue;
        }

        match io.copy(&entry.path, &dest.join(&name)) {
            Ok(()) => report.copied.push(name),
            Err(e) => {
                error!("Failed to sync {}: {:#}", name, e);
                report.failed.push((name, e.to_string()));
            }
        }
    }

    info!(
        "Synced {} markdown file(s) from {:?} to {:?}",
        report.copied.len(),
        source,
        dest
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::MemoryIo;
    use std::path::PathBuf;

    #[test]
    fn test_sync_copies_only_markdown() {
        let io = MemoryIo::new();
        io.add_file("/ext/note.md", "# note");
        io.add_file("/ext/script.js", "console.log(1)");

        let report = sync_content(Path::new("/ext"), Path::new("/content/Notes"), &io);

        assert_eq!(report.copied, vec!["note.md"]);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            io.copies(),
            vec![(
                PathBuf::from("/ext/note.md"),
                PathBuf::from("/content/Notes/note.md")
            )]
        );
        assert_eq!(
            io.contents(Path::new("/content/Notes/note.md")).as_deref(),
            Some("# note")
        );
        assert!(io.contents(Path::new("/content/Notes/script.js")).is_none());
    }

    #[test]
    fn test_sync_missing_source() {
        let io = MemoryIo::new();

        let report = sync_content(Path::new("/ext"), Path::new("/content"), &io);

        assert!(report.source_missing);
        assert!(io.copies().is_empty());
        assert!(!io.exists(Path::new("/content")));
    }

    #[test]
    fn test_sync_overwrites_existing() {
        let io = MemoryIo::new();
        io.add_file("/ext/note.md", "new");
        io.add_file("/content/note.md", "old");

        sync_content(Path::new("/ext"), Path::new("/content"), &io);

        assert_eq!(io.contents(Path::new("/content/note.md")).as_deref(), Some("new"));
    }

    #[test]
    fn test_sync_copy_failure_continues() {
        let io = MemoryIo::new();
        io.add_file("/ext/a.md", "a");
        io.add_file("/ext/b.md", "b");
        io.fail_copies_from("/ext/a.md");

        let report = sync_content(Path::new("/ext"), Path::new("/content"), &io);

        assert!(report.has_errors());
        assert_eq!(report.failed[0].0, "a.md");
        assert_eq!(report.copied, vec!["b.md"]);
    }
}
