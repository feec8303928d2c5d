//! Service Class Provider (SCP) implementation for inbound storage

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::codec::{ObjectCodec, TransferSyntaxCodec};
use crate::config::DimseConfig;
use crate::handler::StoreHandler;
use crate::session::{Association, SessionContext};
use crate::Result;

/// DIMSE storage Service Class Provider
pub struct DimseScp {
    config: DimseConfig,
    handler: Arc<dyn StoreHandler>,
    codec: Option<Arc<dyn ObjectCodec>>,
}

impl DimseScp {
    /// Create a new SCP with the given configuration and store handler
    pub fn new(config: DimseConfig, handler: Arc<dyn StoreHandler>) -> Self {
        Self {
            config,
            handler,
            codec: None,
        }
    }

    /// Use a custom data set codec instead of the configured transfer syntax
    pub fn with_codec(mut self, codec: Arc<dyn ObjectCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn config(&self) -> &DimseConfig {
        &self.config
    }

    /// Start the SCP listener and serve until the process ends
    pub async fn run(self) -> Result<()> {
        self.run_until(CancellationToken::new()).await
    }

    /// Start the SCP listener and serve until `shutdown` is cancelled
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<()> {
        // Validate configuration
        self.config.validate()?;

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr).await?;
        self.run_on(listener, shutdown).await
    }

    /// Serve associations accepted from an already bound listener
    ///
    /// Stops accepting once `shutdown` is cancelled, then waits for running associations.
    /// Associations beyond `max_associations` are read and answered with a transient
    /// rejection.
    pub async fn run_on(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let codec: Arc<dyn ObjectCodec> = match self.codec {
            Some(codec) => codec,
            None => Arc::new(TransferSyntaxCodec::from_uid(&self.config.transfer_syntax)?),
        };

        info!(
            "Starting DIMSE SCP on {} (AET: {}, transfer syntax: {})",
            listener.local_addr()?,
            self.config.local_aet,
            codec.transfer_syntax_uid()
        );

        let limit = Arc::new(Semaphore::new(self.config.max_associations as usize));
        let context = Arc::new(SessionContext::new(self.config, codec, self.handler));
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!("Accepted connection from {}", peer_addr);
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                        }

                        let permit = Arc::clone(&limit).try_acquire_owned().ok();
                        let mut association = Association::new(
                            stream,
                            peer_addr,
                            Arc::clone(&context),
                            shutdown.child_token(),
                        );
                        if permit.is_none() {
                            warn!(
                                "Maximum associations reached, rejecting association from {}",
                                peer_addr
                            );
                            association = association.over_capacity();
                        }

                        tracker.spawn(async move {
                            let summary = association.run().await;
                            drop(permit);
                            debug!("Association from {} finished: {:?}", peer_addr, summary);
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        tracker.close();
        if !tracker.is_empty() {
            info!("Waiting for {} active associations", tracker.len());
        }
        tracker.wait().await;
        info!("DIMSE SCP stopped");
        Ok(())
    }
}

/// Run a storage SCP with default settings
///
/// Every decoded object is passed to `on_object` together with its SOP Instance UID.
/// Returns an error if the listener cannot be bound; otherwise serves until the
/// process ends.
pub async fn serve<H>(
    bind_addr: SocketAddr,
    local_aet: impl Into<String>,
    max_pdu: u32,
    on_object: H,
) -> Result<()>
where
    H: StoreHandler + 'static,
{
    let config = DimseConfig {
        local_aet: local_aet.into(),
        bind_addr: bind_addr.ip(),
        port: bind_addr.port(),
        max_pdu,
        ..Default::default()
    };
    DimseScp::new(config, Arc::new(on_object)).run().await
}
