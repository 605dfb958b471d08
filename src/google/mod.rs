pub mod catalog;
pub mod credentials;
pub mod invoker;
pub mod payload;
pub mod poller;
pub mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::Config,
    error::{Result, StudioError},
    models::{Backend, GenerationOutcome, GenerationRequest, ModelInfo},
    routing::RoutingTable,
};

pub use catalog::ModelCatalog;
pub use credentials::{ClientContext, CredentialResolver};
pub use invoker::{Invocation, SyncResult, VendorInvoker};
pub use poller::{OperationPoller, PollState};
pub use transport::{Credential, HttpTransport, VendorReply, VendorRequest, VendorTransport};

/// Entry point for generation: normalizes, resolves credentials, invokes,
/// polls when needed and normalizes the response.
#[derive(Clone)]
pub struct StudioClient {
    config: Arc<Config>,
    routing: Arc<RoutingTable>,
    resolver: CredentialResolver,
    invoker: VendorInvoker,
    poller: OperationPoller,
    catalog: ModelCatalog,
}

impl StudioClient {
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds the client around a caller-supplied transport. The routing
    /// table comes from `ROUTING_TABLE` when set, else the built-in rows.
    pub fn with_transport(config: Config, transport: Arc<dyn VendorTransport>) -> Result<Self> {
        let routing = match &config.routing_table_path {
            Some(path) => {
                log::info!("Loading routing table from {}", path.display());
                RoutingTable::load(path)?
            }
            None => RoutingTable::default(),
        }
        .with_fallback_override(config.fallback_model.as_deref());

        let resolver = CredentialResolver::new(config.google.clone(), config.request_timeout)?;
        Ok(Self {
            routing: Arc::new(routing),
            resolver,
            invoker: VendorInvoker::new(transport.clone()),
            poller: OperationPoller::new(transport.clone(), config.poll),
            catalog: ModelCatalog::new(transport),
            config: Arc::new(config),
        })
    }

    /// Replaces the routing table. The configured fallback override is
    /// applied to the new table as well.
    pub fn with_routing_table(mut self, table: RoutingTable) -> Self {
        self.routing = Arc::new(table.with_fallback_override(self.config.fallback_model.as_deref()));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Runs one generation request to a terminal result. Validation happens
    /// before any network call. Cancelling `cancel` stops the request at the
    /// next await point and no further upstream calls are made.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome> {
        let request_id = Uuid::new_v4().to_string();
        let spec = self
            .routing
            .normalize(&request, self.config.max_reference_images)
            .map_err(|e| {
                log::warn!("[req:{}] Rejected request: {}", request_id, e);
                e
            })?;

        log::info!(
            "[req:{}] {} request on {} routed to {}",
            request_id,
            if request.is_video() { "Video" } else { "Content" },
            request.backend,
            spec.model_id
        );
        let _timer = crate::logger::timer(&format!("[req:{}] generate", request_id));

        let mut ctx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StudioError::Cancelled),
            ctx = self.resolver.resolve(request.backend) => ctx?,
        };
        if let Some(region) = &spec.region {
            ctx.region = region.clone();
        }

        let body = payload::build_payload(&spec, &request);
        let invocation = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StudioError::Cancelled),
            invocation = self.invoker.invoke(&spec, &ctx, body) => invocation?,
        };

        let outcome = match invocation {
            Invocation::Completed(sync) => {
                let mut outcome = GenerationOutcome::new(response::normalize(&sync.raw), sync.model);
                if let Some(note) = sync.note {
                    outcome = outcome.with_note(note);
                }
                outcome
            }
            Invocation::Started(operation) => {
                log::info!(
                    "[req:{}] Polling {} every {:?}, at most {} times",
                    request_id,
                    operation.operation_name,
                    self.poller.config().interval,
                    self.poller.config().max_attempts
                );
                let raw = self.poller.run(&operation, &ctx, cancel).await?;
                GenerationOutcome::new(response::normalize(&raw), operation.model.clone())
                    .with_operation(operation.operation_name)
            }
        };

        log::info!(
            "[req:{}] Finished with {} result from {}",
            request_id,
            outcome.result.kind(),
            outcome.model
        );
        Ok(outcome)
    }

    pub async fn list_models(&self, backend: Backend) -> Result<Vec<ModelInfo>> {
        let ctx = self.resolver.resolve(backend).await?;
        Ok(self.catalog.list(&ctx).await?)
    }
}
