use clap::Parser;
use markdex::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志
    markdex::init(cli.verbose)?;

    // 执行命令
    cli::commands::run(cli)
}
