//! Process entry point: loads config, connects the graph client, builds
//! the prompt registry and LLM client, and serves the axum router. Startup
//! failures (missing prompts, unreachable database, malformed secret) exit
//! non-zero, matching spec §6's exit-code contract.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use scholarqa_config::AppConfig;
use scholarqa_graph::Neo4jGraphClient;
use scholarqa_llm::OpenAiClient;
use scholarqa_orchestrator::OrchestratorDeps;
use scholarqa_prompt::PromptRegistry;
use scholarqa_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scholarqa_config::load_dotenv();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let prompts = PromptRegistry::load("prompts").context("failed to load prompt registry")?;

    let graph = Neo4jGraphClient::connect(
        &config.graph.uri,
        &config.graph.user,
        &config.graph.password,
        config.timeouts.per_call,
    )
    .await
    .context("failed to connect to graph database")?;

    let llm = OpenAiClient::new(
        config.llm.api_key.clone(),
        config.llm.chat_model.clone(),
        config.llm.embedding_model.clone(),
        config.timeouts.per_call,
    );

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: Arc::new(prompts),
        vector_index_name: config.graph.vector_index_name.clone(),
        fulltext_index_name: config.graph.fulltext_index_name.clone(),
    };

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(&config, deps);
    let app = build_router(state);

    tracing::info!(addr = %bind_addr, "starting scholarqa-server");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    axum::serve(listener, app).await.context("server loop exited with an error")?;

    Ok(())
}
