use anyhow::Result;
use quiz_tutor::{logger, App, Config};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置：优先使用 QUIZ_TUTOR_CONFIG 指向的 TOML 文件
    let config = match std::env::var("QUIZ_TUTOR_CONFIG") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env(),
    };

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
