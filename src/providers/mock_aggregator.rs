use crate::core::oracle::{PriceFeed, RoundData};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

pub const MOCK_DESCRIPTION: &str = "v0.6/tests/MockV3Aggregator.sol";

/// Rounds recorded by a [`MockV3Aggregator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorState {
    pub decimals: u8,
    pub latest_round: u128,
    pub rounds: Vec<RoundData>,
}

impl AggregatorState {
    fn round(&self, round_id: u128) -> Option<RoundData> {
        self.rounds.iter().find(|r| r.round_id == round_id).copied()
    }

    fn record(&mut self, round: RoundData) {
        self.rounds.retain(|r| r.round_id != round.round_id);
        self.rounds.push(round);
        self.latest_round = round.round_id;
    }
}

/// A price feed answering with whatever it was last told.
///
/// Used on development chains in place of a live aggregator.
pub struct MockV3Aggregator {
    state: Mutex<AggregatorState>,
}

impl MockV3Aggregator {
    pub async fn new(decimals: u8, initial_answer: i128) -> Self {
        let aggregator = Self::from_state(AggregatorState {
            decimals,
            ..Default::default()
        });
        aggregator.update_answer(initial_answer).await;
        aggregator
    }

    pub fn from_state(state: AggregatorState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn state(&self) -> AggregatorState {
        self.state.lock().await.clone()
    }

    /// Starts a new round with `answer`, stamped with the current time.
    pub async fn update_answer(&self, answer: i128) {
        let mut state = self.state.lock().await;
        let round_id = state.latest_round + 1;
        let now = Utc::now().timestamp();
        state.record(RoundData {
            round_id,
            answer,
            started_at: now,
            updated_at: now,
            answered_in_round: round_id,
        });
        debug!(round_id, answer, "Mock aggregator answer updated");
    }

    /// Overwrites round `round_id` and makes it the latest one.
    pub async fn update_round_data(
        &self,
        round_id: u128,
        answer: i128,
        timestamp: i64,
        started_at: i64,
    ) {
        let mut state = self.state.lock().await;
        state.record(RoundData {
            round_id,
            answer,
            started_at,
            updated_at: timestamp,
            answered_in_round: round_id,
        });
    }

    pub async fn get_round_data(&self, round_id: u128) -> Result<RoundData> {
        let state = self.state.lock().await;
        state
            .round(round_id)
            .ok_or_else(|| anyhow!("No data present for round {}", round_id))
    }
}

#[async_trait]
impl PriceFeed for MockV3Aggregator {
    async fn latest_round_data(&self) -> Result<RoundData> {
        let state = self.state.lock().await;
        state
            .round(state.latest_round)
            .ok_or_else(|| anyhow!("No data present"))
    }

    async fn decimals(&self) -> Result<u8> {
        Ok(self.state.lock().await.decimals)
    }

    async fn description(&self) -> Result<String> {
        Ok(MOCK_DESCRIPTION.to_string())
    }

    async fn version(&self) -> Result<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_answer() {
        let mock = MockV3Aggregator::new(8, 200_000_000_000).await;
        let round = mock.latest_round_data().await.unwrap();
        assert_eq!(round.round_id, 1);
        assert_eq!(round.answer, 200_000_000_000);
        assert!(round.updated_at > 0);
        assert_eq!(mock.decimals().await.unwrap(), 8);
        assert_eq!(mock.version().await.unwrap(), 0);
        assert_eq!(mock.description().await.unwrap(), MOCK_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_update_answer_starts_new_round() {
        let mock = MockV3Aggregator::new(8, 100).await;
        mock.update_answer(250).await;

        let latest = mock.latest_round_data().await.unwrap();
        assert_eq!(latest.round_id, 2);
        assert_eq!(latest.answer, 250);
        assert_eq!(mock.get_round_data(1).await.unwrap().answer, 100);
        assert!(mock.get_round_data(3).await.is_err());
    }

    #[tokio::test]
    async fn test_update_round_data() {
        let mock = MockV3Aggregator::new(8, 100).await;
        mock.update_round_data(42, 777, 1_700_000_000, 1_699_999_990)
            .await;

        let latest = mock.latest_round_data().await.unwrap();
        assert_eq!(latest.round_id, 42);
        assert_eq!(latest.answer, 777);
        assert_eq!(latest.updated_at, 1_700_000_000);
        assert_eq!(latest.started_at, 1_699_999_990);
    }

    #[tokio::test]
    async fn test_restore_from_state() {
        let mock = MockV3Aggregator::new(18, 5).await;
        let restored = MockV3Aggregator::from_state(mock.state().await);
        assert_eq!(
            restored.latest_round_data().await.unwrap(),
            mock.latest_round_data().await.unwrap()
        );
        assert_eq!(restored.decimals().await.unwrap(), 18);
    }
}
