use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as HyperBuilder,
    service::TowerToHyperService,
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::{
    cli::CommandArguments,
    error::{ServiceError, ServiceResult},
    handler::GoalHandler,
    storage::Storage,
    suggestions::Suggestions,
};

/// Open (or create) the snapshot named by the arguments.
pub fn open_storage(args: &CommandArguments) -> ServiceResult<Storage> {
    let mut storage = match &args.data_file {
        Some(path) => Storage::with_path(path, args.store_options()),
        None => Storage::new(args.store_options())?,
    };
    storage.initialize()?;
    Ok(storage)
}

pub async fn start_server(args: CommandArguments) -> ServiceResult<()> {
    args.validate().map_err(ServiceError::FromString)?;

    let storage = Arc::new(Mutex::new(open_storage(&args)?));
    let suggestions = Arc::new(Suggestions::builtin()?);
    let mut tasks: JoinSet<ServiceResult<()>> = JoinSet::new();

    if args.enable_stdio {
        let handler = GoalHandler::new(storage.clone(), suggestions.clone());
        tasks.spawn(async move {
            let running = handler
                .serve(stdio())
                .await
                .map_err(|e| ServiceError::FromString(format!("Stdio server error: {e}")))?;
            let reason = running
                .waiting()
                .await
                .map_err(|e| ServiceError::FromString(format!("Stdio server error: {e}")))?;
            tracing::info!(?reason, "stdio session closed");
            Ok(())
        });
    }

    if args.enable_http {
        let addr: SocketAddr = args
            .http_addr
            .parse()
            .map_err(|e| ServiceError::FromString(format!("Invalid MCP_HTTP_ADDR: {e}")))?;
        let (storage, suggestions) = (storage.clone(), suggestions.clone());
        tasks.spawn(async move {
            let service = StreamableHttpService::new(
                move || Ok(GoalHandler::new(storage.clone(), suggestions.clone())),
                Arc::new(LocalSessionManager::default()),
                StreamableHttpServerConfig::default(),
            );

            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| ServiceError::FromString(format!("HTTP listen error: {e}")))?;
            tracing::info!(addr = %listener.local_addr()?, "streamable HTTP listening");

            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!("HTTP accept error: {err}");
                        continue;
                    }
                };
                let svc = service.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let hyper_svc = TowerToHyperService::new(svc);
                    if let Err(err) = HyperBuilder::new(TokioExecutor::new())
                        .serve_connection(io, hyper_svc)
                        .await
                    {
                        tracing::warn!(%peer, "HTTP connection error: {err}");
                    }
                });
            }
        });
    }

    tracing::info!(
        stdio = args.enable_stdio,
        http = args.enable_http,
        "{} {} started",
        crate::metadata::PKG_NAME,
        crate::metadata::PKG_VERSION
    );

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(err) => {
                return Err(ServiceError::FromString(format!(
                    "transport task failed: {err}"
                )));
            }
        }
    }
    Ok(())
}
