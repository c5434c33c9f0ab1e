//! Git 引擎封装
//!
//! 使用 libgit2 (git2 crate) 在进程内查询文件的最近提交时间，
//! 适用于没有安装 `git` 命令的环境。

use crate::core::io::ContentIo;
use crate::vcs::CommitHistory;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use git2::{Oid, Repository, Sort};
use std::fs;
use std::path::{Path, PathBuf};

/// Git 引擎
pub struct GitEngine {
    /// Git 仓库
    repo: Repository,
    /// 工作区根目录（已规范化）
    workdir: PathBuf,
}

impl GitEngine {
    /// 从给定路径向上查找并打开 Git 仓库
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to discover git repo from {:?}", path))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| anyhow!("Bare repository has no working tree"))?;
        let workdir = fs::canonicalize(workdir).unwrap_or_else(|_| workdir.to_path_buf());

        Ok(Self { repo, workdir })
    }

    /// 获取工作区路径
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// 文件相对工作区的路径
    fn repo_relative(&self, path: &Path) -> Result<PathBuf> {
        let abs = fs::canonicalize(path).with_context(|| format!("File not found: {:?}", path))?;
        let rel = abs
            .strip_prefix(&self.workdir)
            .with_context(|| format!("{:?} is outside repository", path))?;
        Ok(rel.to_path_buf())
    }

    /// 某个提交中该路径对应的 blob
    fn blob_at(&self, commit: &git2::Commit, rel: &Path) -> Option<Oid> {
        commit.tree().ok()?.get_path(rel).ok().map(|e| e.id())
    }

    /// 最近一次修改该文件的提交时间
    ///
    /// 从 HEAD 按时间倒序遍历，找到第一个与所有父提交相比改变了该文件的提交。
    pub fn last_commit_time(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
        let rel = self.repo_relative(path)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME)?;

        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let Some(blob) = self.blob_at(&commit, &rel) else {
                continue;
            };

            let changed = commit.parent_count() == 0
                || commit
                    .parents()
                    .all(|parent| self.blob_at(&parent, &rel) != Some(blob));

            if changed {
                return to_datetime(commit.committer().when());
            }
        }

        Err(anyhow!("{:?} has no commit history", rel))
    }
}

impl CommitHistory for GitEngine {
    fn last_commit_date(&self, path: &Path, _io: &dyn ContentIo) -> Result<String> {
        Ok(self.last_commit_time(path)?.to_rfc3339())
    }
}

/// git2::Time 转为带时区的时间
fn to_datetime(time: git2::Time) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .ok_or_else(|| anyhow!("Invalid timezone offset {}", time.offset_minutes()))?;
    DateTime::from_timestamp(time.seconds(), 0)
        .map(|t| t.with_timezone(&offset))
        .ok_or_else(|| anyhow!("Invalid commit timestamp {}", time.seconds()))
}
