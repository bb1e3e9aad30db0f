// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bridge engine
//!
//! Owns the single event-feed consumer and everything turns share. Events are
//! routed on the consumer task and applied on a per-session lane, so a slow
//! gateway call for one session never holds up another.

use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatcher::Dispatcher;
use super::identity::{Origin, SessionKey};
use super::registry::{SessionRegistry, Tracked};
use super::resolver::SessionResolver;
use super::supervisor::{Supervisor, TurnOutcome};
use super::turn::TurnRunner;
use super::BridgeOptions;
use crate::agent::{AgentService, Event, EventStream};
use crate::error::Result;
use crate::gateway::MessagingGateway;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Engine lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub struct Engine {
    registry: Arc<SessionRegistry>,
    agent: Arc<dyn AgentService>,
    gateway: Arc<dyn MessagingGateway>,
    options: Arc<BridgeOptions>,
    dispatcher: Arc<Dispatcher>,
    resolver: Arc<SessionResolver>,
    turns: TurnRunner,
    shutdown: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        agent: Arc<dyn AgentService>,
        gateway: Arc<dyn MessagingGateway>,
        options: BridgeOptions,
    ) -> Self {
        let options = Arc::new(options);
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&gateway),
            Arc::clone(&options),
        ));
        let resolver = Arc::new(SessionResolver::new(
            Arc::clone(&agent),
            options.directory.clone(),
        ));
        let supervisor = Arc::new(Supervisor::new(
            Arc::clone(&registry),
            Arc::clone(&agent),
            Arc::clone(&gateway),
            options.poll_interval,
            options.timeout,
        ));
        let turns = TurnRunner::new(
            Arc::clone(&registry),
            Arc::clone(&agent),
            Arc::clone(&gateway),
            Arc::clone(&resolver),
            supervisor,
            Arc::clone(&options),
        );

        Self {
            registry,
            agent,
            gateway,
            options,
            dispatcher,
            resolver,
            turns,
            shutdown: CancellationToken::new(),
            consumer: Mutex::new(None),
        }
    }

    /// Subscribe to the event feed and start consuming it. The first
    /// subscription must succeed; later drops reconnect with backoff.
    pub async fn start(&self) -> Result<()> {
        if lock(&self.consumer).is_some() {
            tracing::debug!("event feed consumer already running");
            return Ok(());
        }

        let stream = self.agent.subscribe().await?;
        tracing::info!(gateway = self.gateway.name(), "event feed connected");

        let consumer = FeedConsumer {
            agent: Arc::clone(&self.agent),
            dispatcher: Arc::clone(&self.dispatcher),
            registry: Arc::clone(&self.registry),
            lanes: HashMap::new(),
        };
        let shutdown = self.shutdown.child_token();
        let handle = tokio::spawn(consumer.run(stream, shutdown));

        let mut slot = lock(&self.consumer);
        if slot.is_some() {
            handle.abort();
        } else {
            *slot = Some(handle);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.consumer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one user message through the agent. See [`TurnRunner::run`].
    pub async fn run_turn(&self, origin: &Origin, message: &str) -> Result<Option<TurnOutcome>> {
        self.turns.run(origin, message, &self.shutdown).await
    }

    /// Stop the consumer, cancel supervised turns and drop all records.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = lock(&self.consumer).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "event feed consumer ended abnormally");
            }
        }
        self.registry.clear();
        tracing::info!("bridge engine stopped");
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<SessionResolver> {
        &self.resolver
    }

    pub fn agent(&self) -> &Arc<dyn AgentService> {
        &self.agent
    }

    pub fn gateway(&self) -> &Arc<dyn MessagingGateway> {
        &self.gateway
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

type LaneSender = mpsc::UnboundedSender<(Tracked, Event)>;

struct FeedConsumer {
    agent: Arc<dyn AgentService>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<SessionRegistry>,
    lanes: HashMap<SessionKey, LaneSender>,
}

impl FeedConsumer {
    async fn run(mut self, mut stream: EventStream, shutdown: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if !self.drain(&mut stream, &shutdown).await {
                break;
            }

            loop {
                tracing::info!(delay_ms = backoff.as_millis() as u64, "reconnecting to event feed");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);

                match self.agent.subscribe().await {
                    Ok(next) => {
                        tracing::info!("event feed reconnected");
                        stream = next;
                        backoff = INITIAL_BACKOFF;
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "event feed subscription failed");
                    }
                }
            }
        }
        tracing::debug!("event feed consumer stopped");
    }

    /// Consume until the stream ends or fails. Returns false on shutdown.
    async fn drain(&mut self, stream: &mut EventStream, shutdown: &CancellationToken) -> bool {
        loop {
            let item = tokio::select! {
                _ = shutdown.cancelled() => return false,
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => self.forward(event),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "event feed failed");
                    return true;
                }
                None => {
                    tracing::warn!("event feed closed");
                    return true;
                }
            }
        }
    }

    fn forward(&mut self, event: Event) {
        self.lanes.retain(|key, tx| !tx.is_closed() && self.registry.contains(key));

        let Some(tracked) = self.dispatcher.route(&event) else {
            return;
        };
        let lane = self
            .lanes
            .entry(tracked.key.clone())
            .or_insert_with(|| spawn_lane(Arc::clone(&self.dispatcher), &tracked.key));
        if let Err(mpsc::error::SendError((tracked, _))) = lane.send((tracked, event)) {
            tracing::warn!(key = %tracked.key, "session lane closed, dropping event");
        }
    }
}

/// Apply events for one session in arrival order.
fn spawn_lane(dispatcher: Arc<Dispatcher>, key: &SessionKey) -> LaneSender {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Tracked, Event)>();
    tracing::trace!(key = %key, "opening session lane");
    tokio::spawn(async move {
        while let Some((tracked, event)) = rx.recv().await {
            dispatcher.apply(&tracked, event).await;
        }
    });
    tx
}
