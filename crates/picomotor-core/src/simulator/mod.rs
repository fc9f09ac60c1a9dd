//! Simulated Controller
//!
//! An in-process stand-in for the 8742 that implements [`Transport`]. Every
//! written line is parsed and dispatched to the handler table; answers to
//! queries are queued and handed out by `read_line` in FIFO order.
//!
//! Not modeled: real motion timing (the motion-done query answers at
//! random), the error buffer (always "no error") and persistence of
//! settings (recall/reset/save are accepted and ignored).

mod grammar;
mod handlers;

pub use grammar::{parse, Request};
pub use handlers::{
    ControllerState, DEFAULT_ACCELERATION, DEFAULT_VELOCITY, IDENTIFICATION, NO_ERROR_MESSAGE,
};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{trace, warn};

use crate::protocol::{ProtocolError, Transport};
use handlers::{lookup, DeviceModel};

/// Simulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Probability that one motion-done query reports done
    pub done_probability: f64,
    /// Seed for reproducible motion-done answers (random when unset)
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            done_probability: 0.5,
            seed: None,
        }
    }
}

/// Simulated 8742 controller
pub struct SimulatedController {
    model: DeviceModel,
    pending: VecDeque<String>,
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new(&SimulatorConfig::default())
    }
}

impl SimulatedController {
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model: DeviceModel::new(rng, config.done_probability),
            pending: VecDeque::new(),
        }
    }

    /// Connect to the simulation. Always succeeds.
    pub async fn connect(config: &SimulatorConfig) -> Result<Self, ProtocolError> {
        Ok(Self::new(config))
    }

    /// Current per-channel state
    pub fn state(&self) -> &ControllerState {
        &self.model.state
    }

    /// Answers computed but not yet read
    pub fn pending(&self) -> &VecDeque<String> {
        &self.pending
    }
}

#[async_trait]
impl Transport for SimulatedController {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let request = parse(line)?;
        let Some(handler) = lookup(&request.mnemonic, request.query) else {
            warn!("cmd ignored: {}", line);
            return Ok(());
        };

        if let Some(answer) = handler.invoke(&mut self.model, &request)? {
            trace!("queue {:?} for {}", answer, line);
            self.pending.push_back(answer);
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        match self.pending.pop_front() {
            Some(answer) => Ok(answer),
            None => {
                // An ignored query never gets an answer
                warn!("read with no pending response; stalling");
                std::future::pending().await
            }
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::PendingResponses(
                self.pending.drain(..).collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Controller;
    use std::time::Duration;

    fn seeded(done_probability: f64) -> SimulatedController {
        SimulatedController::new(&SimulatorConfig {
            done_probability,
            seed: Some(42),
        })
    }

    #[tokio::test]
    async fn test_write_query_queues_answer() {
        let mut sim = seeded(0.5);
        sim.write_line("1VA?").await.unwrap();
        assert_eq!(sim.pending().len(), 1);
        assert_eq!(sim.read_line().await.unwrap(), "2000");
        assert!(sim.pending().is_empty());
    }

    #[tokio::test]
    async fn test_answers_are_fifo() {
        let mut sim = seeded(0.5);
        sim.write_line("1PA10").await.unwrap();
        sim.write_line("2PA20").await.unwrap();
        sim.write_line("1PA?").await.unwrap();
        sim.write_line("2PA?").await.unwrap();
        assert_eq!(sim.read_line().await.unwrap(), "10");
        assert_eq!(sim.read_line().await.unwrap(), "20");
    }

    #[tokio::test]
    async fn test_malformed_line_is_fatal() {
        let mut sim = seeded(0.5);
        assert!(matches!(
            sim.write_line("1VA?2").await,
            Err(ProtocolError::Malformed(_))
        ));
        assert!(sim.pending().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_dropped() {
        let mut sim = seeded(0.5);
        sim.write_line("1XY5").await.unwrap();
        assert!(sim.pending().is_empty());
        assert_eq!(sim.state(), &ControllerState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_query_stalls_read() {
        let mut sim = seeded(0.5);
        sim.write_line("1XY?").await.unwrap();
        let read = tokio::time::timeout(Duration::from_secs(1), sim.read_line()).await;
        assert!(read.is_err(), "read should never complete");
    }

    #[tokio::test]
    async fn test_close_with_pending_answer_fails() {
        let mut sim = seeded(0.5);
        sim.write_line("*IDN?").await.unwrap();
        match sim.close().await {
            Err(ProtocolError::PendingResponses(p)) => assert_eq!(p, vec![IDENTIFICATION]),
            other => panic!("Expected PendingResponses, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_when_drained() {
        let mut sim = seeded(0.5);
        sim.write_line("*IDN?").await.unwrap();
        sim.read_line().await.unwrap();
        assert!(sim.close().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_with_certain_completion_polls_once() {
        let mut ctrl = Controller::new(seeded(1.0));
        let start = tokio::time::Instant::now();
        ctrl.finish(Some(1)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(ctrl.transport().pending().is_empty());
    }
}
