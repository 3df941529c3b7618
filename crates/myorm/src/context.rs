//! Named connections and the runtime context handed to entity operations.
//!
//! Connections are created on first use and cached per name for the lifetime
//! of the registry. The cache is guarded by a mutex, so concurrent callers
//! asking for the same name share one client.

use crate::client::GenericClient;
use crate::entity::Registry;
use crate::error::OrmResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolves a connection name to a shared client.
pub trait ConnectionProvider: Send + Sync {
    type Client: GenericClient;

    fn connection(&self, name: &str) -> impl Future<Output = OrmResult<Arc<Self::Client>>> + Send;
}

/// Opens a new client for a connection name.
pub trait ConnectionFactory: Send + Sync {
    type Client: GenericClient;

    fn connect(&self, name: &str) -> impl Future<Output = OrmResult<Self::Client>> + Send;
}

/// Lazily-populated, process-wide cache of named clients.
pub struct ConnectionRegistry<F: ConnectionFactory> {
    factory: F,
    clients: Mutex<HashMap<String, Arc<F::Client>>>,
}

impl<F: ConnectionFactory> ConnectionRegistry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Names that currently have an open client.
    pub async fn open_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<F: ConnectionFactory> ConnectionProvider for ConnectionRegistry<F> {
    type Client = F::Client;

    async fn connection(&self, name: &str) -> OrmResult<Arc<F::Client>> {
        // Held across connect so two callers never open the same name twice.
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(name) {
            return Ok(Arc::clone(client));
        }
        tracing::debug!(target: "myorm.connection", name, "opening connection");
        let client = Arc::new(self.factory.connect(name).await?);
        clients.insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

/// A provider that answers every name with the same client.
pub struct SingleConnection<C> {
    client: Arc<C>,
}

impl<C: GenericClient> SingleConnection<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_arc(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

impl<C: GenericClient> ConnectionProvider for SingleConnection<C> {
    type Client = C;

    async fn connection(&self, _name: &str) -> OrmResult<Arc<C>> {
        Ok(Arc::clone(&self.client))
    }
}

/// Everything entity operations need: where to get clients and how to
/// resolve related tables.
pub struct Context<P: ConnectionProvider> {
    provider: P,
    registry: Registry,
}

impl<P: ConnectionProvider> Context<P> {
    pub fn new(provider: P, registry: Registry) -> Self {
        Self { provider, registry }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Client for a named connection.
    pub async fn client(&self, name: &str) -> OrmResult<Arc<P::Client>> {
        self.provider.connection(name).await
    }
}
