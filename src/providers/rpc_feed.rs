//! Reads an aggregator contract on a live network over JSON-RPC.

use crate::core::Address;
use crate::core::oracle::{PriceFeed, RoundData};
use crate::providers::util::{RetryPolicy, with_retry};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

const LATEST_ROUND_DATA: &str = "0xfeaf968c";
const DECIMALS: &str = "0x313ce567";
const DESCRIPTION: &str = "0x7284e416";
const VERSION: &str = "0x54fd4d50";

const WORD: usize = 32;

pub struct RpcPriceFeed {
    rpc_url: String,
    address: Address,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl RpcPriceFeed {
    pub fn new(rpc_url: &str, address: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fundme/0.1")
            .build()?;
        Ok(RpcPriceFeed {
            rpc_url: rpc_url.to_string(),
            address: address.to_string(),
            retry: RetryPolicy::default(),
            client,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(name = "RpcEthCall", skip(self), fields(feed = %self.address))]
    async fn eth_call(&self, selector: &str) -> Result<Vec<u8>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": self.address, "data": selector }, "latest"],
        });

        let (client, url, body) = (&self.client, &self.rpc_url, &body);
        let response = with_retry(self.retry, || async move {
            client.post(url).json(body).send().await?.error_for_status()
        })
        .await
        .with_context(|| format!("RPC request to {} failed", self.rpc_url))?;

        let text = response.text().await?;
        debug!(response = %text, "Received RPC response");

        let reply: RpcResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse RPC response: '{text}'"))?;
        if let Some(error) = reply.error {
            bail!("RPC error {}: {}", error.code, error.message);
        }
        let result = reply
            .result
            .ok_or_else(|| anyhow!("RPC response has neither result nor error"))?;
        decode_hex(&result)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[async_trait]
impl PriceFeed for RpcPriceFeed {
    async fn latest_round_data(&self) -> Result<RoundData> {
        let data = self.eth_call(LATEST_ROUND_DATA).await?;
        let words = words(&data, 5)?;
        Ok(RoundData {
            round_id: decode_uint(words[0])?,
            answer: decode_int(words[1])?,
            started_at: decode_timestamp(words[2])?,
            updated_at: decode_timestamp(words[3])?,
            answered_in_round: decode_uint(words[4])?,
        })
    }

    async fn decimals(&self) -> Result<u8> {
        let data = self.eth_call(DECIMALS).await?;
        let value = decode_uint(words(&data, 1)?[0])?;
        u8::try_from(value).context("decimals do not fit into uint8")
    }

    async fn description(&self) -> Result<String> {
        let data = self.eth_call(DESCRIPTION).await?;
        decode_string(&data)
    }

    async fn version(&self) -> Result<u64> {
        let data = self.eth_call(VERSION).await?;
        let value = decode_uint(words(&data, 1)?[0])?;
        u64::try_from(value).context("version does not fit into 64 bits")
    }
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).with_context(|| format!("Invalid hex data: {value}"))
}

fn words(data: &[u8], count: usize) -> Result<Vec<&[u8]>> {
    if data.len() < count * WORD {
        bail!(
            "Expected {} ABI words, got {} bytes",
            count,
            data.len()
        );
    }
    Ok(data.chunks(WORD).take(count).collect())
}

fn decode_uint(word: &[u8]) -> Result<u128> {
    let (high, low) = word.split_at(WORD / 2);
    if high.iter().any(|b| *b != 0) {
        bail!("ABI uint does not fit into 128 bits");
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    Ok(u128::from_be_bytes(bytes))
}

fn decode_int(word: &[u8]) -> Result<i128> {
    let (high, low) = word.split_at(WORD / 2);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    let value = i128::from_be_bytes(bytes);
    let extension = if value < 0 { 0xff } else { 0x00 };
    if high.iter().any(|b| *b != extension) {
        bail!("ABI int does not fit into 128 bits");
    }
    Ok(value)
}

fn decode_timestamp(word: &[u8]) -> Result<i64> {
    i64::try_from(decode_uint(word)?).context("timestamp does not fit into 64 bits")
}

fn decode_string(data: &[u8]) -> Result<String> {
    let offset = usize::try_from(decode_uint(words(data, 1)?[0])?)?;
    let tail = data
        .get(offset..)
        .ok_or_else(|| anyhow!("ABI string offset {} out of bounds", offset))?;
    let len = usize::try_from(decode_uint(words(tail, 1)?[0])?)?;
    let end = WORD
        .checked_add(len)
        .ok_or_else(|| anyhow!("ABI string length {} overflows", len))?;
    let bytes = tail
        .get(WORD..end)
        .ok_or_else(|| anyhow!("ABI string length {} out of bounds", len))?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = "0x694AA1769357215DE4FAC081bf1f309aDC325306";

    fn word_uint(value: u128) -> String {
        format!("{value:064x}")
    }

    fn word_int(value: i128) -> String {
        let extension = if value < 0 { "f".repeat(32) } else { "0".repeat(32) };
        format!("{extension}{}", hex::encode(value.to_be_bytes()))
    }

    fn rpc_result(data: &str) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":"0x{data}"}}"#)
    }

    #[test]
    fn test_decode_string() {
        let data = hex::decode(format!(
            "{}{}{}",
            word_uint(32),
            word_uint(5),
            format!("{:0<64}", hex::encode("hello"))
        ))
        .unwrap();
        assert_eq!(decode_string(&data).unwrap(), "hello");
    }

    #[test]
    fn test_decode_string_rejects_oversized_length() {
        let data = hex::decode(format!("{}{}", word_uint(32), word_uint(u64::MAX.into()))).unwrap();
        assert!(decode_string(&data).is_err());

        let data = hex::decode(format!("{}{}", word_uint(32), word_uint(33))).unwrap();
        let err = decode_string(&data).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    async fn mount(server: &MockServer, selector: &str, body: String) {
        Mock::given(method("POST"))
            .and(body_string_contains(selector))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn fast_feed(server: &MockServer) -> RpcPriceFeed {
        RpcPriceFeed::new(&server.uri(), FEED)
            .unwrap()
            .with_retry_policy(RetryPolicy {
                retries: 2,
                delay_ms: 1,
            })
    }

    #[tokio::test]
    async fn test_latest_round_data() {
        let server = MockServer::start().await;
        let data = [
            word_uint(18_446_744_073_709_562_301),
            word_int(312_456_000_000),
            word_uint(1_700_000_000),
            word_uint(1_700_000_012),
            word_uint(18_446_744_073_709_562_301),
        ]
        .concat();
        mount(&server, LATEST_ROUND_DATA, rpc_result(&data)).await;
        mount(&server, DECIMALS, rpc_result(&word_uint(8))).await;

        let feed = fast_feed(&server);
        let round = feed.latest_round_data().await.unwrap();
        assert_eq!(round.round_id, 18_446_744_073_709_562_301);
        assert_eq!(round.answer, 312_456_000_000);
        assert_eq!(round.started_at, 1_700_000_000);
        assert_eq!(round.updated_at, 1_700_000_012);
        assert_eq!(feed.decimals().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_negative_answer_decodes() {
        let server = MockServer::start().await;
        let data = [
            word_uint(1),
            word_int(-42),
            word_uint(1),
            word_uint(1),
            word_uint(1),
        ]
        .concat();
        mount(&server, LATEST_ROUND_DATA, rpc_result(&data)).await;

        let round = fast_feed(&server).latest_round_data().await.unwrap();
        assert_eq!(round.answer, -42);
    }

    #[tokio::test]
    async fn test_description_and_version() {
        let server = MockServer::start().await;
        let text = "ETH / USD";
        let mut padded = hex::encode(text);
        padded.push_str(&"0".repeat(64 - padded.len()));
        let data = [word_uint(32), word_uint(text.len() as u128), padded].concat();
        mount(&server, DESCRIPTION, rpc_result(&data)).await;
        mount(&server, VERSION, rpc_result(&word_uint(4))).await;

        let feed = fast_feed(&server);
        assert_eq!(feed.description().await.unwrap(), "ETH / USD");
        assert_eq!(feed.version().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_rpc_error_is_reported() {
        let server = MockServer::start().await;
        let body =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#;
        mount(&server, LATEST_ROUND_DATA, body.to_string()).await;

        let result = fast_feed(&server).latest_round_data().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "RPC error -32000: execution reverted"
        );
    }

    #[tokio::test]
    async fn test_short_response_is_rejected() {
        let server = MockServer::start().await;
        mount(&server, LATEST_ROUND_DATA, rpc_result(&word_uint(1))).await;

        let result = fast_feed(&server).latest_round_data().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "Expected 5 ABI words, got 32 bytes"
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        mount(&server, DECIMALS, rpc_result(&word_uint(8))).await;

        assert_eq!(fast_feed(&server).decimals().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let result = fast_feed(&server).decimals().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("RPC request to")
        );
    }
}
