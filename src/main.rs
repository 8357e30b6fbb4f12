use anyhow::Result;
use mesh_core::config::Config;
use mesh_core::mesh::{self, MeshCoordinator};
use mesh_core::ports::{HttpToolClient, InMemoryKv, KvStore, RedisKv, SystemClock, ToolInvocationPort};
use mesh_core::skills::ProgressiveSkillsManager;
use mesh_core::tracker::TokenTracker;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting mesh coordination engine");

    let config = Config::load()?;

    let kv: Arc<dyn KvStore> = match &config.mesh.kv_url {
        Some(url) => {
            info!("Connecting to Redis-backed KV at configured URL");
            Arc::new(RedisKv::connect(url).await?)
        }
        None => {
            info!("No KV_URL configured, using in-memory KV (state will not survive a restart)");
            Arc::new(InMemoryKv::new())
        }
    };

    let tool: Arc<dyn ToolInvocationPort> = Arc::new(HttpToolClient::new(config.mesh.tool_servers.clone())?);
    let clock = Arc::new(SystemClock);
    let tracker = Arc::new(TokenTracker::new(kv.clone(), clock.clone()));
    let skills = Arc::new(ProgressiveSkillsManager::new(
        Path::new(&config.mesh.skills_registry_path),
        tool.clone(),
        tracker.clone(),
    ));

    let coordinator: Arc<MeshCoordinator> =
        MeshCoordinator::new(config.mesh.clone(), clock, kv, tool, skills, tracker);

    // Submission, routing, and execution are driven by whatever embeds this
    // coordinator; the HTTP/WebSocket edge is an external collaborator
    // (§1). This process owns the coordinator's state and its background
    // governance monitors for the lifetime of the mesh.
    mesh::monitors::run(coordinator).await;

    Ok(())
}
