use anyhow::Result;
use field_submit::utils::logging;
use field_submit::{App, Config};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // Ctrl-C 取消正在进行的提交，未完成的草稿保留在发件箱
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在取消提交...");
            on_signal.cancel();
        }
    });

    // 初始化并运行应用
    let stats = App::initialize(config).await?.run_with_cancel(cancel).await?;

    if stats.failed > 0 {
        anyhow::bail!("{} 个草稿提交失败，已保留在发件箱", stats.failed);
    }

    Ok(())
}
