use std::sync::Arc;

use pipeline::{
    HttpRagService, PromptBudgeter, StepContext, StoryPipeline, SubprocessFineTune, WorkerSpeech,
};
use storyloom_core::WorkerRegistry;
use worker_rpc::WorkerClient;

use crate::config::ServerConfig;
use crate::supervisor::WorkerSupervisor;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<WorkerRegistry>,
    pub supervisor: Arc<WorkerSupervisor>,
    pub ctx: Arc<StepContext>,
    pub pipeline: Arc<StoryPipeline>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(WorkerRegistry::new());
        let supervisor = Arc::new(WorkerSupervisor::new(
            Arc::clone(&registry),
            config.supervisor.clone(),
        ));

        let ctx = Arc::new(StepContext {
            text: WorkerClient::for_port(config.workers.text.port),
            vision: WorkerClient::for_port(config.workers.vision.port),
            image: WorkerClient::for_port(config.workers.image.port),
            finetune: Arc::new(SubprocessFineTune::new(
                config.pipeline.finetune_command.clone(),
                config.pipeline.finetune_args.clone(),
            )),
            rag: Arc::new(HttpRagService::new(config.pipeline.rag_url.clone())),
            speech: Arc::new(WorkerSpeech::new(WorkerClient::for_port(
                config.workers.speech.port,
            ))),
            budgeter: PromptBudgeter::new(config.pipeline.token_budget),
            base_model: config.pipeline.base_model.clone(),
            adapters_dir: config.paths.adapters_dir.clone(),
            index_root: config.paths.index_root.clone(),
            scratch_dir: std::env::temp_dir(),
        });

        let pipeline = Arc::new(StoryPipeline::new(Arc::clone(&ctx)));

        Self {
            config: Arc::new(config),
            registry,
            supervisor,
            ctx,
            pipeline,
        }
    }
}
