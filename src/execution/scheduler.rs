//! Scheduler - ready queue plus the phase state machine

use crate::core::blueprint::Blueprint;
use crate::core::message::{Message, TaskToken};
use crate::error::EngineError;
use crate::execution::queue::{MessageQueue, PriorityQueue};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info};

/// What the scheduler hands back from [`Scheduler::next`]
#[derive(Debug)]
pub enum Next {
    /// A message to dispatch
    Message(Message),
    /// The previous phase drained and this phase was started
    PhaseStarted(usize),
    /// The last phase drained
    Complete,
}

/// Decides what runs next and when a phase, and the pipeline, is complete
///
/// A token stays in the running set from the moment its message is
/// created until the dispatcher has finished interpreting its result.
pub struct Scheduler {
    blueprint: Blueprint,
    queue: Box<dyn MessageQueue>,
    running: HashSet<TaskToken>,
    current_phase: usize,
    start_priority: u32,
}

impl Scheduler {
    pub fn new(blueprint: Blueprint, start_priority: u32) -> Self {
        Self::with_queue(blueprint, start_priority, Box::new(PriorityQueue::new()))
    }

    pub fn with_queue(blueprint: Blueprint, start_priority: u32, queue: Box<dyn MessageQueue>) -> Self {
        Self {
            blueprint,
            queue,
            running: HashSet::new(),
            current_phase: 0,
            start_priority,
        }
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn phase_count(&self) -> usize {
        self.blueprint.phase_count()
    }

    pub fn running(&self) -> &HashSet<TaskToken> {
        &self.running
    }

    pub fn is_running(&self, token: &str) -> bool {
        self.running.contains(token)
    }

    pub async fn queued(&self) -> usize {
        self.queue.len().await
    }

    /// Queue the first step of phase `index`
    pub async fn start_phase(&mut self, index: usize) -> Result<(), EngineError> {
        let phase = match self.blueprint.phase(index) {
            Some(phase) => phase,
            None if self.blueprint.phases.is_empty() => return Err(EngineError::EmptyBlueprint),
            None => return Err(EngineError::EmptyPhase(index)),
        };
        let msg = Message::phase_start(phase, self.start_priority)
            .ok_or(EngineError::EmptyPhase(index))?;

        info!("Starting phase {} with '{}'", index, msg.task.label());
        self.current_phase = index;
        self.register(msg.task_token.clone());
        self.enqueue(&msg).await
    }

    /// Add a token to the running set
    pub fn register(&mut self, token: TaskToken) {
        self.running.insert(token);
    }

    /// Remove a fully processed token from the running set
    pub fn complete(&mut self, token: &str) -> bool {
        self.running.remove(token)
    }

    /// Serialize and queue a message
    pub async fn enqueue(&self, msg: &Message) -> Result<(), EngineError> {
        let payload = msg.to_wire()?;
        debug!(
            "Queueing '{}' (priority {}, token {})",
            msg.task.id, msg.priority, msg.task_token
        );
        self.queue.push(msg.priority, payload).await;
        Ok(())
    }

    /// Whether the pipeline is done: nothing running and on the last phase
    pub fn is_complete(&self) -> bool {
        self.running.is_empty() && self.current_phase + 1 >= self.blueprint.phase_count()
    }

    /// Wait up to `idle_timeout` for the next message
    ///
    /// An idle window with an empty running set ends the current phase:
    /// the next phase is started, or the pipeline is complete. An idle
    /// window with tokens still registered means a message was lost and
    /// is reported as a stall.
    pub async fn next(&mut self, idle_timeout: Duration) -> Result<Next, EngineError> {
        if let Some(payload) = self.queue.pop(idle_timeout).await {
            return Ok(Next::Message(Message::from_wire(&payload)?));
        }

        if !self.running.is_empty() {
            error!(
                "Queue idle for {:?} with {} task(s) still registered in phase {}",
                idle_timeout,
                self.running.len(),
                self.current_phase
            );
            return Err(EngineError::Stalled {
                running: self.running.len(),
            });
        }

        if self.is_complete() {
            info!("Phase {} drained, pipeline complete", self.current_phase);
            return Ok(Next::Complete);
        }

        info!("Phase {} drained", self.current_phase);
        let next_phase = self.current_phase + 1;
        self.start_phase(next_phase).await?;
        Ok(Next::PhaseStarted(next_phase))
    }
}
