//! Production `NetworkAccessor`: wraps an `alloy` RPC provider exactly as
//! the teacher wraps one in `script/src/bin/e2e.rs` — a thin `sol!`
//! interface plus a couple of `Provider` calls. This is the one place the
//! CLI layer touches the network; the validator logic itself lives in
//! `manifest_core::preflight` and knows nothing about RPC transport.

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};
use anyhow::Context;
use manifest_core::error::{ManifestError, Result};
use manifest_core::preflight::NetworkAccessor;

sol! {
    #[sol(rpc)]
    interface IDispatcher {
        function activeManifestHash() external view returns (bytes32);
    }
}

pub struct AlloyNetworkAccessor {
    provider: DynProvider,
    chain_id: u64,
}

impl AlloyNetworkAccessor {
    pub async fn connect(rpc_url: &str) -> anyhow::Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(rpc_url.parse().context("invalid RPC URL")?)
            .erased();
        let chain_id = provider.get_chain_id().await.context("get_chain_id failed")?;
        Ok(Self { provider, chain_id })
    }
}

#[async_trait::async_trait]
impl NetworkAccessor for AlloyNetworkAccessor {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| ManifestError::ArtifactUnresolved {
                contract: address.to_string(),
                reason: e.to_string(),
            })?;
        Ok(code.to_vec())
    }

    async fn active_manifest_hash(&self, dispatcher: Address) -> Result<Option<B256>> {
        let code = self.get_code(dispatcher).await?;
        if code.is_empty() {
            return Ok(None);
        }
        let contract = IDispatcher::new(dispatcher, self.provider.clone());
        let hash = contract
            .activeManifestHash()
            .call()
            .await
            .map_err(|e| ManifestError::ArtifactUnresolved {
                contract: dispatcher.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(hash))
    }
}
