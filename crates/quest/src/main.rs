mod api;
mod config;
mod database;
mod utils;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::routes::build_router;
use crate::config::{Args, Config};
use crate::database::{close_database, setup_database};
use crate::utils::ai_gateway::{AiGateway, HttpAiGateway};
use crate::utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logger(&args.log_level, &args.log_dir)?;

    let config = Config::from_args(args);
    info!(
        "quest-server v{} 启动中，环境: {}，端口: {}",
        env!("CARGO_PKG_VERSION"),
        config.environment,
        config.port
    );

    let connection = setup_database(&config).await?;
    let ai: Arc<dyn AiGateway> = Arc::new(HttpAiGateway::new(config.ai_url.clone())?);
    let config = Arc::new(config);
    let app = build_router(Arc::new(connection.clone()), ai, config.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听端口 {}", config.port))?;
    info!("HTTP 服务已启动: http://{}", addr);
    info!("接口文档: http://{}/swagger-ui", addr);

    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = utils::signal::terminate().await {
                error!("监听退出信号失败: {:#}", e);
            }
            info!("收到退出信号，正在停止服务");
        })
        .await;

    close_database(connection).await;
    served.context("HTTP 服务异常退出")?;
    info!("服务已退出");
    Ok(())
}
