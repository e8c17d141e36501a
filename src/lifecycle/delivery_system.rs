use crate::clients::{DeliveryClient, DeliveryQueries};
use crate::config::Config;
use crate::delivery_actor::DeliveryContext;
use crate::position_stream::PositionStream;
use crate::realtime::Gateway;
use crate::registry::ConnectionRegistry;
use crate::store::Stores;
use std::sync::Arc;
use tracing::{error, info};

/// The runtime orchestrator of the dispatch core.
///
/// `DeliverySystem` is responsible for:
/// - **Lifecycle Management**: starting the delivery actor and stopping it on shutdown
/// - **Dependency Wiring**: handing the stores and the registry to every component
///
/// # Example
///
/// ```ignore
/// let system = DeliverySystem::new(&config, stores);
///
/// let delivery = system.deliveries.create_delivery(order_id).await?;
/// let (mut session, mut outbound) = system.gateway.connect();
///
/// system.shutdown().await?;
/// ```
pub struct DeliverySystem {
    /// Lifecycle commands, serialized per delivery
    pub deliveries: DeliveryClient,

    /// Read-side queries
    pub queries: DeliveryQueries,

    /// GPS ingestion and ETA
    pub positions: PositionStream,

    /// Live connections and fan-out
    pub registry: ConnectionRegistry,

    /// Entry point for real-time sessions
    pub gateway: Gateway,

    /// Task handles for all running actors (used for graceful shutdown)
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl DeliverySystem {
    /// Creates the components and spawns the delivery actor.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: &Config, stores: Stores) -> Self {
        let registry = ConnectionRegistry::new();

        // 1. Create the actor (context is bound when it starts)
        let (delivery_actor, deliveries) = crate::delivery_actor::new(&config.actor);

        // 2. Start it with its dependencies
        let context = DeliveryContext::new(
            stores.clone(),
            Arc::new(registry.clone()),
            config.validation_code_length,
        );
        let delivery_handle = tokio::spawn(delivery_actor.run(context));

        // 3. Components that bypass the actor
        let queries = DeliveryQueries::new(&stores);
        let positions = PositionStream::new(stores, Arc::new(registry.clone()), &config.tracking);
        let gateway = Gateway::new(
            deliveries.clone(),
            queries.clone(),
            positions.clone(),
            registry.clone(),
            config.registry.outbound_capacity,
        );

        info!(
            buffer = config.actor.buffer,
            idle_timeout_ms = config.actor.idle_timeout_ms,
            "Delivery system started"
        );

        Self {
            deliveries,
            queries,
            positions,
            registry,
            gateway,
            handles: vec![delivery_handle],
        }
    }

    /// Gracefully shuts down the system.
    ///
    /// Dropping the clients closes the actor's channel; the actor then drains the commands
    /// already queued on its workers and exits. Sessions still holding a [`Gateway`] keep
    /// the channel open, so drop them first.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the actor shut down cleanly
    /// - `Err(String)` if the actor task failed or panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        drop(self.deliveries);
        drop(self.gateway);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(format!("Actor task failed: {:?}", e));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
