//! Agent wiring and the inbound event pipeline.
//!
//! Pipeline: dedup → self-echo filter → mention admission → thread dispatch.
//! Everything after admission happens inside the thread's worker; this loop
//! never blocks on handler work.

use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codebutler_chat::approval::ApprovalRouter;
use codebutler_chat::dedup::EventDeduper;
use codebutler_chat::mention;
use codebutler_chat::redact::Redactor;
use codebutler_chat::transport::ChatTransport;
use codebutler_chat::Outbox;
use codebutler_core::clock::Clock;
use codebutler_core::config::ButlerConfig;
use codebutler_core::paths::ButlerPaths;
use codebutler_core::types::{AgentIdentity, ChatEvent, Role, ThreadMessage};
use codebutler_dispatch::{ThreadRegistry, WorkerConfig};
use codebutler_gc::{reconcile, GarbageCollector, ThreadProbes};
use codebutler_lifecycle::LifecycleManager;
use codebutler_mappings::MappingStore;
use codebutler_prompt::PromptCache;
use codebutler_worktree::{CommandRunner, WorktreeManager};

use crate::error::Result;
use crate::executor::Executor;
use crate::handler::AgentHandler;

/// Everything the core does not implement itself.
pub struct Collaborators {
    pub transport: Arc<dyn ChatTransport>,
    pub probes: Arc<dyn ThreadProbes>,
    pub executor: Arc<dyn Executor>,
    pub store: Arc<dyn MappingStore>,
    pub runner: Arc<dyn CommandRunner>,
    pub clock: Arc<dyn Clock>,
}

pub struct Agent {
    role: Role,
    identity: AgentIdentity,
    config: ButlerConfig,
    transport: Arc<dyn ChatTransport>,
    probes: Arc<dyn ThreadProbes>,
    store: Arc<dyn MappingStore>,
    clock: Arc<dyn Clock>,
    dedup: Arc<EventDeduper>,
    outbox: Arc<Outbox>,
    registry: ThreadRegistry,
    manager: Arc<WorktreeManager>,
    gc: Arc<GarbageCollector>,
    approvals: Arc<ApprovalRouter>,
    lifecycle: Arc<LifecycleManager>,
}

impl Agent {
    pub fn new(
        role: Role,
        config: ButlerConfig,
        paths: &ButlerPaths,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let Collaborators {
            transport,
            probes,
            executor,
            store,
            runner,
            clock,
        } = collaborators;

        let lifecycle = Arc::new(LifecycleManager::new());
        let cancel = lifecycle.root_token();

        let identity = AgentIdentity::for_role(role);
        let dedup = Arc::new(EventDeduper::new(&config.dedup, Arc::clone(&clock)));
        let outbox = Arc::new(Outbox::new(
            Arc::clone(&transport),
            identity.clone(),
            Redactor::new(),
        ));

        let seeds_dir = config
            .prompt
            .seeds_dir
            .as_ref()
            .map(Into::into)
            .unwrap_or_else(|| paths.dot_dir());
        let skills_dir = config
            .prompt
            .skills_dir
            .as_ref()
            .map(Into::into)
            .unwrap_or_else(|| paths.skills_dir());
        let prompt = Arc::new(PromptCache::new(seeds_dir, skills_dir, role));

        let manager = Arc::new(WorktreeManager::new(
            paths.repo_root(),
            paths.branches_dir(),
            runner,
        ));

        let handler = Arc::new(AgentHandler::new(
            prompt,
            executor,
            Arc::clone(&outbox),
            Arc::clone(&manager),
            Arc::clone(&store),
            Arc::clone(&clock),
            cancel.clone(),
        ));
        let registry = ThreadRegistry::new(
            WorkerConfig::from(&config.agent),
            handler,
            cancel.clone(),
        );

        let gc = Arc::new(GarbageCollector::new(
            Arc::clone(&manager),
            Arc::clone(&store),
            Arc::clone(&probes),
            Arc::clone(&outbox),
            Arc::clone(&clock),
            config.gc.clone(),
        ));

        Ok(Self {
            role,
            identity,
            config,
            transport,
            probes,
            store,
            clock,
            dedup,
            outbox,
            registry,
            manager,
            gc,
            approvals: Arc::new(ApprovalRouter::new()),
            lifecycle,
        })
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn approvals(&self) -> &Arc<ApprovalRouter> {
        &self.approvals
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    pub fn active_threads(&self) -> usize {
        self.registry.active_threads()
    }

    /// Run until the transport closes or shutdown is requested.
    ///
    /// Startup order matters: recovery reconciles worktrees before any
    /// message can provision new ones, and before the first GC pass.
    pub async fn run(&self) -> Result<()> {
        let cancel = self.lifecycle.root_token();
        info!(role = %self.role, name = %self.identity.display_name, "agent starting");

        let report = reconcile(
            self.role,
            &self.manager,
            self.store.as_ref(),
            self.probes.as_ref(),
            &self.clock,
            &cancel,
        )
        .await?;
        debug!(?report, "recovery report");

        self.spawn_background_tasks(&cancel);
        self.register_shutdown_hooks();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(role = %self.role, "event loop cancelled");
                    break;
                }
                event = self.transport.next_event() => match event {
                    Some(event) => self.on_event(event).await,
                    None => {
                        info!(role = %self.role, "transport closed");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    fn spawn_background_tasks(&self, cancel: &CancellationToken) {
        // Periodic GC.
        {
            let gc = Arc::clone(&self.gc);
            let cancel = cancel.clone();
            tokio::spawn(async move { gc.run(cancel).await });
        }

        // Dedup sweeper: keeps idle memory bounded; correctness does not
        // depend on it.
        {
            let dedup = Arc::clone(&self.dedup);
            let ttl = self.config.dedup.ttl();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(ttl);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = ticker.tick() => {
                            let evicted = dedup.evict_expired();
                            if evicted > 0 {
                                debug!(evicted, "dedup sweep");
                            }
                        }
                    }
                }
            });
        }

        // Interaction callbacks → approval router.
        {
            let transport = Arc::clone(&self.transport);
            let approvals = Arc::clone(&self.approvals);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        interaction = transport.next_interaction() => match interaction {
                            Some(interaction) => approvals.route(&interaction).await,
                            None => return,
                        },
                    }
                }
            });
        }
    }

    fn register_shutdown_hooks(&self) {
        {
            let registry = self.registry.clone();
            self.lifecycle.on_shutdown("thread-registry", move |_ctx| {
                let active = registry.active_threads();
                async move {
                    info!(active, "thread registry at shutdown");
                    Ok(())
                }
                .boxed()
            });
        }
        {
            let transport = Arc::clone(&self.transport);
            self.lifecycle.on_shutdown("transport", move |_ctx| {
                let transport = Arc::clone(&transport);
                async move {
                    transport.close().await;
                    Ok(())
                }
                .boxed()
            });
        }
    }

    /// Admission pipeline for one inbound event.
    async fn on_event(&self, event: ChatEvent) {
        if !self.dedup.check(&event.event_id) {
            return;
        }

        // Our own outbound messages echo back with our prefix; other bots
        // (including sibling roles) are legitimate senders.
        let own_prefix = format!("@{}: ", self.identity.display_name);
        if event.sender_is_bot && event.text.starts_with(&own_prefix) {
            debug!(event_id = %event.event_id, "own echo, skipping");
            return;
        }

        if !mention::should_process(self.role, &event.text) {
            debug!(event_id = %event.event_id, "not addressed to this role");
            return;
        }

        if let Err(e) = self
            .outbox
            .acknowledge(&event.channel_id, &event.message_id)
            .await
        {
            warn!(event_id = %event.event_id, error = %e, "failed to acknowledge message");
        }

        self.registry.dispatch(ThreadMessage::from(&event));
    }
}
