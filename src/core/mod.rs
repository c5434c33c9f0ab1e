pub mod builder;
pub mod config;
pub mod io;
pub mod record;
pub mod scanner;
pub mod strip;
pub mod sync;
pub mod toc;

// 重新导出常用的公共 API
pub use builder::{run_build, sort_listing, BuildReport, IndexBuilder};
pub use config::BuildConfig;
pub use io::{ContentIo, DirEntry, MemoryIo, OsIo};
pub use record::{ListingRecord, SearchIndexRecord, UNCATEGORIZED};
pub use scanner::{ScanOutput, Scanner};
pub use strip::{highlight_match, strip_markdown};
pub use sync::{sync_content, SyncReport};
pub use toc::{compile_markdown_files, split_toc, CompiledDoc, SplitDoc};
