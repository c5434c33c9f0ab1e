//! I/O 能力模块
//!
//! 把流水线用到的文件系统和子进程操作收拢成一个 trait，
//! 生产环境注入 [`OsIo`]，测试注入 [`MemoryIo`]。
//!
//! ## 能力列表
//!
//! - `read_dir` / `read_to_string` / `modified` - 读取
//! - `write` / `create_dir_all` / `copy` - 写入
//! - `exists` - 存在性检查
//! - `exec` - 运行外部命令并捕获标准输出

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// 完整路径
    pub path: PathBuf,
    /// 是否为目录
    pub is_dir: bool,
}

impl DirEntry {
    /// 文件名（含扩展名）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// 流水线依赖的全部外部能力
pub trait ContentIo {
    /// 列出目录的直接子项，顺序即底层返回的顺序
    fn read_dir(&self, dir: &Path) -> Result<Vec<DirEntry>>;

    /// 以 UTF-8 读取文件
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// 文件的最后修改时间
    fn modified(&self, path: &Path) -> Result<DateTime<Utc>>;

    /// 运行外部命令，返回标准输出
    ///
    /// 非零退出码、超时都视为错误；标准错误不会输出到当前进程。
    fn exec(&self, program: &str, args: &[String], timeout: Duration) -> Result<String>;

    /// 写入文件，已存在则覆盖
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// 路径是否存在
    fn exists(&self, path: &Path) -> bool;

    /// 递归创建目录
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// 复制文件，已存在则覆盖
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
}

/// 基于操作系统的真实实现
#[derive(Debug, Clone, Copy, Default)]
pub struct OsIo;

impl ContentIo for OsIo {
    fn read_dir(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to read dir {:?}", dir))? {
            let path = entry?.path();
            // 跟随符号链接，与 stat 语义一致
            let meta = fs::metadata(&path).with_context(|| format!("Failed to stat {:?}", path))?;
            entries.push(DirEntry {
                path,
                is_dir: meta.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }

    fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        let mtime = fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to read mtime of {:?}", path))?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    fn exec(&self, program: &str, args: &[String], timeout: Duration) -> Result<String> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                bail!("{} timed out after {:?}", program, timeout);
            }
            thread::sleep(Duration::from_millis(10));
        };

        if !status.success() {
            bail!("{} exited with {}", program, status);
        }

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)?;
        }
        Ok(stdout)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("Failed to create dir {:?}", path))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        Ok(())
    }
}

type ExecHandler = Box<dyn Fn(&str, &[String]) -> Result<String>>;

#[derive(Debug, Clone)]
struct MemFile {
    path: PathBuf,
    contents: String,
    modified: DateTime<Utc>,
}

/// 内存中的假实现
///
/// 目录由文件路径隐式构成，也可用 [`MemoryIo::add_dir`] 显式添加。
/// `read_dir` 按插入顺序返回，便于测试依赖发现顺序的逻辑。
/// 所有 `exec`、`copy`、`modified` 调用都会被记录下来。
pub struct MemoryIo {
    files: RefCell<Vec<MemFile>>,
    dirs: RefCell<Vec<PathBuf>>,
    exec_handler: RefCell<ExecHandler>,
    exec_calls: RefCell<Vec<(String, Vec<String>)>>,
    copies: RefCell<Vec<(PathBuf, PathBuf)>>,
    stat_calls: RefCell<Vec<PathBuf>>,
    failing_writes: RefCell<Vec<PathBuf>>,
    failing_copies: RefCell<Vec<PathBuf>>,
}

impl Default for MemoryIo {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIo {
    /// 创建空的内存文件系统，`exec` 默认失败
    pub fn new() -> Self {
        Self {
            files: RefCell::new(Vec::new()),
            dirs: RefCell::new(Vec::new()),
            exec_handler: RefCell::new(Box::new(|program, _| {
                Err(anyhow!("{}: command not available", program))
            })),
            exec_calls: RefCell::new(Vec::new()),
            copies: RefCell::new(Vec::new()),
            stat_calls: RefCell::new(Vec::new()),
            failing_writes: RefCell::new(Vec::new()),
            failing_copies: RefCell::new(Vec::new()),
        }
    }

    /// 添加文件，修改时间为 Unix 纪元
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.add_file_with_mtime(path, contents, DateTime::<Utc>::UNIX_EPOCH);
    }

    /// 添加带修改时间的文件
    pub fn add_file_with_mtime(
        &self,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        modified: DateTime<Utc>,
    ) {
        let path = path.into();
        let contents = contents.into();
        let mut files = self.files.borrow_mut();
        if let Some(existing) = files.iter_mut().find(|f| f.path == path) {
            existing.contents = contents;
            existing.modified = modified;
        } else {
            files.push(MemFile {
                path,
                contents,
                modified,
            });
        }
    }

    /// 添加空目录
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut dirs = self.dirs.borrow_mut();
        if !dirs.contains(&path) {
            dirs.push(path);
        }
    }

    /// 设置 `exec` 的行为
    pub fn on_exec<F>(&self, handler: F)
    where
        F: Fn(&str, &[String]) -> Result<String> + 'static,
    {
        *self.exec_handler.borrow_mut() = Box::new(handler);
    }

    /// 让写入该路径时失败
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing_writes.borrow_mut().push(path.into());
    }

    /// 让以该路径为源的复制失败
    pub fn fail_copies_from(&self, path: impl Into<PathBuf>) {
        self.failing_copies.borrow_mut().push(path.into());
    }

    /// 读取文件内容
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files
            .borrow()
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.contents.clone())
    }

    /// 记录的 `exec` 调用
    pub fn exec_calls(&self) -> Vec<(String, Vec<String>)> {
        self.exec_calls.borrow().clone()
    }

    /// 记录的 `copy` 调用
    pub fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        self.copies.borrow().clone()
    }

    /// 记录的 `modified` 调用
    pub fn stat_calls(&self) -> Vec<PathBuf> {
        self.stat_calls.borrow().clone()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.borrow().iter().any(|d| d == path)
            || self
                .files
                .borrow()
                .iter()
                .any(|f| f.path != path && f.path.starts_with(path))
    }

    fn find(&self, path: &Path) -> Result<MemFile> {
        self.files
            .borrow()
            .iter()
            .find(|f| f.path == path)
            .cloned()
            .ok_or_else(|| anyhow!("No such file: {:?}", path))
    }
}

impl ContentIo for MemoryIo {
    fn read_dir(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        if !self.is_dir(dir) {
            bail!("No such directory: {:?}", dir);
        }

        let mut entries: Vec<DirEntry> = Vec::new();
        let mut push = |path: PathBuf, is_dir: bool| {
            if !entries.iter().any(|e| e.path == path) {
                entries.push(DirEntry { path, is_dir });
            }
        };

        for file in self.files.borrow().iter() {
            let Ok(rest) = file.path.strip_prefix(dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let child = dir.join(first);
            push(child, components.next().is_some());
        }

        for sub in self.dirs.borrow().iter() {
            if sub.parent() == Some(dir) {
                push(sub.clone(), true);
            }
        }

        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(self.find(path)?.contents)
    }

    fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.stat_calls.borrow_mut().push(path.to_path_buf());
        Ok(self.find(path)?.modified)
    }

    fn exec(&self, program: &str, args: &[String], _timeout: Duration) -> Result<String> {
        self.exec_calls
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        (self.exec_handler.borrow())(program, args)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if self.failing_writes.borrow().iter().any(|p| p == path) {
            bail!("Permission denied: {:?}", path);
        }
        self.add_file_with_mtime(path, contents, Utc::now());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_dir(path) || self.files.borrow().iter().any(|f| f.path == path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            self.add_dir(dir);
            current = dir.parent();
        }
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if self.failing_copies.borrow().iter().any(|p| p == from) {
            bail!("Failed to copy {:?}", from);
        }
        let source = self.find(from)?;
        self.copies
            .borrow_mut()
            .push((from.to_path_buf(), to.to_path_buf()));
        self.add_file_with_mtime(to, source.contents, source.modified);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_read_dir_keeps_insertion_order() {
        let io = MemoryIo::new();
        io.add_file("/root/b.md", "b");
        io.add_file("/root/PHP/x.md", "x");
        io.add_file("/root/a.md", "a");
        io.add_dir("/root/empty");

        let names: Vec<_> = io
            .read_dir(Path::new("/root"))
            .unwrap()
            .into_iter()
            .map(|e| (e.file_name(), e.is_dir))
            .collect();

        assert_eq!(
            names,
            vec![
                ("b.md".to_string(), false),
                ("PHP".to_string(), true),
                ("a.md".to_string(), false),
                ("empty".to_string(), true),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_os_exec_times_out() {
        let started = Instant::now();
        let result = OsIo.exec("sleep", &["5".to_string()], Duration::from_millis(200));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err:#}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_memory_read_dir_missing() {
        let io = MemoryIo::new();
        assert!(io.read_dir(Path::new("/nope")).is_err());
    }

    #[test]
    fn test_memory_exec_records_calls() {
        let io = MemoryIo::new();
        io.on_exec(|_, _| Ok("out".to_string()));

        let out = io
            .exec("git", &["status".to_string()], Duration::from_secs(1))
            .unwrap();
        assert_eq!(out, "out");
        assert_eq!(io.exec_calls().len(), 1);
        assert_eq!(io.exec_calls()[0].0, "git");
    }

    #[test]
    fn test_os_io_write_and_list() {
        let temp = TempDir::new().unwrap();
        let io = OsIo;

        io.create_dir_all(&temp.path().join("a/b")).unwrap();
        io.write(&temp.path().join("a/b/note.md"), "# note").unwrap();

        let entries = io.read_dir(&temp.path().join("a")).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir);
        assert_eq!(
            io.read_to_string(&temp.path().join("a/b/note.md")).unwrap(),
            "# note"
        );
        assert!(io.modified(&temp.path().join("a/b/note.md")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_os_io_exec_nonzero_exit_is_error() {
        let io = OsIo;
        assert!(io.exec("false", &[], Duration::from_secs(5)).is_err());
        let out = io
            .exec("echo", &["hi".to_string()], Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.trim(), "hi");
    }
}
