//! Gateway HTTP server hosting the interception dispatcher.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::context::GatewayContext;
use crate::dispatch::Dispatcher;

pub struct GatewayServer {
    addr: SocketAddr,
    ctx: Arc<GatewayContext>,
}

impl GatewayServer {
    pub fn new(addr: SocketAddr, ctx: Arc<GatewayContext>) -> Self {
        GatewayServer { addr, ctx }
    }

    /// Run the accept loop. One task per connection; the dispatcher is
    /// shared across all of them.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("portico gateway listening on http://{}", self.addr);

        let dispatcher = Arc::new(Dispatcher::new(self.ctx));
        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = Arc::clone(&dispatcher);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move { Ok::<_, Infallible>(dispatcher.dispatch(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error: {}", e);
                }
            });
        }
    }
}
