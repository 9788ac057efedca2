//! JSON-RPC chain oracle backed by `web3`
//!
//! Native balances use `eth_getBalance` at the latest block. Token balances
//! use `eth_call` with ABI-encoded `balanceOf(address)`.

use async_trait::async_trait;
use ethabi::{ParamType, Token};
use tracing::debug;
use types::{Balance, ChainAddress};
use web3::transports::Http;
use web3::types::{CallRequest, U256};
use web3::Web3;

use crate::chain_client::ChainOracle;
use crate::error::{Result, SyncError};

/// `keccak256("balanceOf(address)")[..4]`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Calldata for `balanceOf(wallet)`
pub fn encode_balance_of(wallet: ChainAddress) -> Vec<u8> {
    let mut data = BALANCE_OF_SELECTOR.to_vec();
    data.extend(ethabi::encode(&[Token::Address(wallet.as_address())]));
    data
}

/// Decode a `uint256` return value; an empty result reads as zero
pub fn decode_balance(output: &[u8]) -> Result<Balance> {
    if output.is_empty() {
        return Ok(Balance::zero());
    }
    let mut tokens = ethabi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| SyncError::InvalidResponse(format!("balanceOf output: {}", e)))?;
    match tokens.pop() {
        Some(Token::Uint(value)) => Ok(Balance::from_uint(value)),
        other => Err(SyncError::InvalidResponse(format!(
            "expected uint256, got {:?}",
            other
        ))),
    }
}

pub struct Web3Oracle {
    endpoint: String,
    web3: Web3<Http>,
}

impl Web3Oracle {
    pub fn new(endpoint: &str) -> Result<Self> {
        let transport = Http::new(endpoint).map_err(|e| {
            SyncError::Configuration(format!("invalid RPC endpoint {}: {}", endpoint, e))
        })?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            web3: Web3::new(transport),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> Result<u64> {
        let id: U256 = self
            .web3
            .eth()
            .chain_id()
            .await
            .map_err(|e| SyncError::Rpc(e.to_string()))?;
        Ok(id.low_u64())
    }
}

#[async_trait]
impl ChainOracle for Web3Oracle {
    async fn native_balance(&self, address: ChainAddress) -> Result<Balance> {
        let balance = self
            .web3
            .eth()
            .balance(address.as_address(), None)
            .await
            .map_err(|e| SyncError::Rpc(e.to_string()))?;
        debug!("eth_getBalance {} = {}", address, balance);
        Ok(Balance::from_uint(balance))
    }

    async fn token_balance(&self, token: ChainAddress, wallet: ChainAddress) -> Result<Balance> {
        let request = CallRequest {
            to: Some(token.as_address()),
            data: Some(encode_balance_of(wallet).into()),
            ..Default::default()
        };
        let output = self
            .web3
            .eth()
            .call(request, None)
            .await
            .map_err(|e| SyncError::Rpc(e.to_string()))?;
        decode_balance(&output.0)
    }
}
