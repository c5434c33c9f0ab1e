//! 版本控制日期模块
//!
//! 为文件确定“最后修改时间”：优先取版本历史中最近一次提交的时间，
//! 取不到再退回文件系统的修改时间。
//!
//! 历史来源有两种实现：
//!
//! - [`GitCli`] - 通过 [`ContentIo::exec`] 调用 `git log`
//! - [`GitEngine`] - 使用 libgit2 在进程内遍历历史

pub mod git_engine;

pub use git_engine::GitEngine;

use crate::core::io::ContentIo;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// 默认的 git 命令超时
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// 提交历史来源
pub trait CommitHistory {
    /// 返回最近一次修改该文件的提交时间（严格 ISO-8601 字符串）
    fn last_commit_date(&self, path: &Path, io: &dyn ContentIo) -> Result<String>;
}

/// 历史后端选择
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// 调用 `git` 命令
    #[default]
    Cli,
    /// 使用 libgit2
    Libgit2,
}

/// 调用 `git log -1 --format=%cI` 查询提交时间
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT)
    }
}

impl GitCli {
    /// 创建带超时的查询器
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 构造命令参数
    ///
    /// 用 `-C` 切换到文件所在目录，保证与当前工作目录无关。
    pub fn args_for(path: &Path) -> Vec<String> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
            _ => ".".to_string(),
        };
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        vec![
            "-C".to_string(),
            dir,
            "log".to_string(),
            "-1".to_string(),
            "--format=%cI".to_string(),
            "--".to_string(),
            file,
        ]
    }
}

impl CommitHistory for GitCli {
    fn last_commit_date(&self, path: &Path, io: &dyn ContentIo) -> Result<String> {
        io.exec("git", &Self::args_for(path), self.timeout)
    }
}

/// 按后端创建历史来源
///
/// libgit2 打不开仓库时退回 [`GitCli`]，后者失败时会在解析日期时退回文件修改时间。
pub fn history_for(backend: HistoryBackend, root: &Path, timeout: Duration) -> Box<dyn CommitHistory> {
    match backend {
        HistoryBackend::Cli => Box::new(GitCli::new(timeout)),
        HistoryBackend::Libgit2 => match GitEngine::discover(root) {
            Ok(engine) => {
                debug!("Reading commit history from {:?}", engine.workdir());
                Box::new(engine)
            }
            Err(e) => {
                warn!("libgit2 unavailable for {:?}: {:#}, falling back to git cli", root, e);
                Box::new(GitCli::new(timeout))
            }
        },
    }
}

/// 解析提交时间字符串
///
/// 空字符串或非法格式返回 `None`。
pub fn parse_commit_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// 解析文件的最后修改时间
///
/// 依次尝试：提交历史 → 文件修改时间 → Unix 纪元。
/// 永不失败。
///
/// # Arguments
///
/// * `path` - 文件路径
/// * `history` - 提交历史来源
/// * `io` - I/O 能力
pub fn resolve_date(path: &Path, history: &dyn CommitHistory, io: &dyn ContentIo) -> DateTime<Utc> {
    match history.last_commit_date(path, io) {
        Ok(raw) => match parse_commit_date(&raw) {
            Some(date) => return date,
            None => debug!("No usable commit date for {:?} ({:?}), using mtime", path, raw.trim()),
        },
        Err(e) => debug!("History lookup failed for {:?}: {:#}, using mtime", path, e),
    }

    match io.modified(path) {
        Ok(mtime) => mtime,
        Err(e) => {
            warn!("Cannot read mtime of {:?}: {:#}", path, e);
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::MemoryIo;
    use crate::core::record::format_timestamp;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn io_with_file(mtime: DateTime<Utc>) -> MemoryIo {
        let io = MemoryIo::new();
        io.add_file_with_mtime("test.md", "# test", mtime);
        io
    }

    #[test]
    fn test_resolve_uses_commit_date() {
        let io = io_with_file(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        io.on_exec(|_, _| Ok("2023-01-01T00:00:00+08:00\n".to_string()));

        let date = resolve_date(Path::new("test.md"), &GitCli::default(), &io);

        assert_eq!(format_timestamp(&date), "2022-12-31T16:00:00.000Z");
        assert!(io.stat_calls().is_empty());

        let calls = io.exec_calls();
        let (program, args) = &calls[0];
        assert_eq!(program, "git");
        assert!(args.iter().any(|a| a == "log"));
        assert!(args.iter().any(|a| a == "-1"));
        assert!(args.iter().any(|a| a == "--format=%cI"));
    }

    #[test]
    fn test_resolve_accepts_utc_suffix() {
        let io = io_with_file(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        io.on_exec(|_, _| Ok("2023-01-01T00:00:00.000Z".to_string()));

        let date = resolve_date(Path::new("test.md"), &GitCli::default(), &io);
        assert_eq!(format_timestamp(&date), "2023-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_resolve_falls_back_when_git_fails() {
        let mtime = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let io = io_with_file(mtime);
        io.on_exec(|_, _| Err(anyhow!("Git error")));

        let date = resolve_date(Path::new("test.md"), &GitCli::default(), &io);

        assert_eq!(date, mtime);
        assert_eq!(io.stat_calls(), vec![PathBuf::from("test.md")]);
    }

    #[test]
    fn test_resolve_falls_back_on_empty_output() {
        let mtime = Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0).unwrap();
        let io = io_with_file(mtime);
        io.on_exec(|_, _| Ok(String::new()));

        assert_eq!(resolve_date(Path::new("test.md"), &GitCli::default(), &io), mtime);
        assert_eq!(io.stat_calls().len(), 1);
    }

    #[test]
    fn test_resolve_falls_back_on_garbage() {
        let mtime = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        let io = io_with_file(mtime);
        io.on_exec(|_, _| Ok("not a date".to_string()));

        assert_eq!(resolve_date(Path::new("test.md"), &GitCli::default(), &io), mtime);
    }

    #[test]
    fn test_resolve_never_fails() {
        let io = MemoryIo::new();
        let date = resolve_date(Path::new("missing.md"), &GitCli::default(), &io);
        assert_eq!(date, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_git_cli_args() {
        let args = GitCli::args_for(Path::new("content/PHP/laravel.md"));
        assert_eq!(
            args,
            vec!["-C", "content/PHP", "log", "-1", "--format=%cI", "--", "laravel.md"]
        );

        let args = GitCli::args_for(Path::new("top.md"));
        assert_eq!(args[1], ".");
    }
}
