use std::sync::Arc;

use waypoint_config::WaypointConfig;
use waypoint_search::SearchEngine;
use waypoint_upstream::{ApiClient, UpstreamError};

use crate::capabilities::{default_capabilities, CapabilityRegistry};
use crate::providers::default_providers;
use crate::registry::{ResourceProviderRegistry, ToolProviderRegistry};
use crate::sinks::{
    AcceptNonEmptyValidator, AuditSink, CredentialValidator, MetricsSink, TracingAuditSink,
    TracingMetricsSink,
};
use crate::tools::SearchTool;
use crate::version::{FeatureVersionMap, ProtocolVersion, VersionNegotiator, VersionRange};

/// Everything sessions share: registries, the search engine, and the
/// injected collaborator services. Constructed once at startup and handed
/// to every connection.
pub struct SharedState {
    pub config: WaypointConfig,
    pub capabilities: CapabilityRegistry,
    pub versions: VersionNegotiator,
    pub features: FeatureVersionMap,
    pub resources: ResourceProviderRegistry,
    pub tools: ToolProviderRegistry,
    pub engine: Arc<SearchEngine>,
    pub validator: Arc<dyn CredentialValidator>,
    pub audit: Arc<dyn AuditSink>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl SharedState {
    pub fn new(config: WaypointConfig) -> Result<Arc<Self>, UpstreamError> {
        let api = Arc::new(ApiClient::new(config.upstream.clone())?);
        let engine = Arc::new(SearchEngine::new(api.clone(), config.search.clone()));

        let tools = ToolProviderRegistry::new();
        tools.register(Arc::new(SearchTool::new(engine.clone(), &config.search)));

        let resources = default_providers(api);

        let mut features = FeatureVersionMap::default();
        features.add_feature(
            "textDocument",
            VersionRange {
                min: ProtocolVersion::V1_1,
                max: None,
            },
        );

        Ok(Arc::new(Self {
            config,
            capabilities: default_capabilities(),
            versions: VersionNegotiator::default(),
            features,
            resources,
            tools,
            engine,
            validator: Arc::new(AcceptNonEmptyValidator),
            audit: Arc::new(TracingAuditSink),
            metrics: Arc::new(TracingMetricsSink),
        }))
    }
}
