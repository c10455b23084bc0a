#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use manifest_core::artifact_store::{ArtifactStore, WriteOptions};
    use manifest_core::config::{ArtifactResolver, FacetArtifact, FacetConfig, ReleaseConfig};
    use manifest_core::error::{ManifestError, Result};
    use manifest_core::manifest::{compose, BuildParams, Manifest, NetworkInfo};
    use manifest_core::merkle;
    use manifest_core::preflight::{self, NetworkAccessor};
    use manifest_core::selectors::{FunctionAbi, InterfaceDescription};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// A release's worth of facets, resolved from an in-memory map rather
    /// than a directory of compiled artifacts.
    struct FixtureResolver(HashMap<String, FacetArtifact>);

    impl ArtifactResolver for FixtureResolver {
        fn resolve(&self, contract_id: &str) -> Result<FacetArtifact> {
            self.0
                .get(contract_id)
                .cloned()
                .ok_or_else(|| ManifestError::ArtifactUnresolved {
                    contract: contract_id.to_string(),
                    reason: "not in fixture".into(),
                })
        }
    }

    fn facet_artifact(creation: u8, runtime: u8, fn_name: &str) -> FacetArtifact {
        FacetArtifact {
            creation_bytecode: vec![0x60, creation],
            runtime_bytecode: vec![0x60, runtime, 0x00],
            interface: InterfaceDescription {
                functions: vec![FunctionAbi {
                    name: fn_name.into(),
                    inputs: vec!["uint256".into()],
                }],
            },
        }
    }

    fn factory() -> Address {
        "0x00000000000000000000000000000000000F4c"
            .parse()
            .unwrap()
    }

    fn dispatcher() -> Address {
        "0x00000000000000000000000000000000000D15"
            .parse()
            .unwrap()
    }

    fn base_params() -> BuildParams<'static> {
        BuildParams {
            factory: factory(),
            network: NetworkInfo {
                name: "sepolia".into(),
                chain_id: 11155111,
            },
            dispatcher_address: dispatcher(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            previous_hash: None,
            known_addresses: None,
        }
    }

    fn two_facet_release() -> (ReleaseConfig, FixtureResolver) {
        let mut map = HashMap::new();
        map.insert("TokenFacet".to_string(), facet_artifact(0x01, 0x81, "transfer"));
        map.insert("StakingFacet".to_string(), facet_artifact(0x02, 0x82, "stake"));

        let config = ReleaseConfig {
            version: "1.2.0".into(),
            description: "token + staking facets".into(),
            facets: vec![
                FacetConfig {
                    name: "TokenFacet".into(),
                    contract: "TokenFacet".into(),
                    selectors: vec![],
                    priority: 0,
                    gas_limit: Some(150_000),
                },
                FacetConfig {
                    name: "StakingFacet".into(),
                    contract: "StakingFacet".into(),
                    selectors: vec![],
                    priority: 1,
                    gas_limit: Some(220_000),
                },
            ],
            deployment: HashMap::new(),
        };
        (config, FixtureResolver(map))
    }

    // ---- S1/S2: a multi-facet build round-trips through disk and every
    // leaf's own proof verifies against the persisted root. ----
    #[test]
    fn build_then_persist_then_reload_preserves_every_proof() {
        let (config, resolver) = two_facet_release();
        let output = compose(&config, &resolver, &base_params()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store
            .write_json("manifest.json", &output.manifest, WriteOptions::default())
            .unwrap();
        store
            .write_json("merkle.json", &output.merkle, WriteOptions::default())
            .unwrap();

        let reloaded_manifest: Manifest = store.read_json("manifest.json").unwrap();
        let reloaded_merkle: manifest_core::manifest::MerkleSidecar =
            store.read_json("merkle.json").unwrap();

        assert_eq!(reloaded_manifest.routes.len(), 2);
        assert_eq!(reloaded_merkle.leaves.len(), 2);
        for (i, leaf) in reloaded_merkle.leaves.iter().enumerate() {
            assert!(merkle::verify(*leaf, &reloaded_merkle.proofs[i], reloaded_merkle.root));
        }
        assert_eq!(reloaded_merkle.root, reloaded_manifest.merkle_root);
    }

    // ---- S2: predicted CREATE2 addresses match the manifest's recorded
    // addresses for every facet when no known-address override is given. ----
    #[test]
    fn predicted_addresses_match_recorded_addresses() {
        let (config, resolver) = two_facet_release();
        let output = compose(&config, &resolver, &base_params()).unwrap();

        let checks =
            preflight::verify_predicted_addresses(&output.manifest, factory(), &resolver).unwrap();
        assert_eq!(checks.len(), 2);
        assert!(checks.iter().all(|(_, ok)| *ok));
    }

    // ---- S3: overriding one facet's salt changes only that facet's
    // address, and ripples into the merkle root and manifest hash, but the
    // other facet's address is untouched. ----
    #[test]
    fn salt_override_is_isolated_to_its_own_facet() {
        let (base_config, resolver) = two_facet_release();
        let baseline = compose(&base_config, &resolver, &base_params()).unwrap();

        let mut overridden_config = base_config.clone();
        overridden_config
            .deployment
            .insert("StakingFacet".to_string(), [0x42u8; 32]);
        let overridden = compose(&overridden_config, &resolver, &base_params()).unwrap();

        let token_before = baseline
            .manifest
            .facets
            .iter()
            .find(|f| f.name == "TokenFacet")
            .unwrap()
            .address;
        let token_after = overridden
            .manifest
            .facets
            .iter()
            .find(|f| f.name == "TokenFacet")
            .unwrap()
            .address;
        assert_eq!(token_before, token_after);

        let staking_before = baseline
            .manifest
            .facets
            .iter()
            .find(|f| f.name == "StakingFacet")
            .unwrap()
            .address;
        let staking_after = overridden
            .manifest
            .facets
            .iter()
            .find(|f| f.name == "StakingFacet")
            .unwrap()
            .address;
        assert_ne!(staking_before, staking_after);
        assert_ne!(baseline.manifest.merkle_root, overridden.manifest.merkle_root);
        assert_ne!(
            baseline.manifest.manifest_hash,
            overridden.manifest.manifest_hash
        );
    }

    // ---- S4/S5: a release that can't be resolved at all never produces a
    // partial manifest on disk. ----
    #[test]
    fn unresolvable_facet_aborts_before_any_artifact_is_built() {
        let config = ReleaseConfig {
            version: "1.0.0".into(),
            description: "".into(),
            facets: vec![FacetConfig {
                name: "GhostFacet".into(),
                contract: "GhostFacet".into(),
                selectors: vec![],
                priority: 0,
                gas_limit: None,
            }],
            deployment: HashMap::new(),
        };
        let resolver = FixtureResolver(HashMap::new());
        let err = compose(&config, &resolver, &base_params()).unwrap_err();
        assert!(matches!(err, ManifestError::ArtifactUnresolved { .. }));
    }

    // A network accessor whose on-chain hash and dispatcher-code presence
    // are set directly by the test, rather than talking to an RPC endpoint.
    struct FixedAccessor {
        chain_id: u64,
        on_chain_hash: Option<B256>,
        dispatcher_deployed: bool,
    }

    #[async_trait::async_trait]
    impl NetworkAccessor for FixedAccessor {
        async fn chain_id(&self) -> Result<u64> {
            Ok(self.chain_id)
        }
        async fn get_code(&self, _address: Address) -> Result<Vec<u8>> {
            Ok(if self.dispatcher_deployed {
                vec![0x60, 0x80]
            } else {
                Vec::new()
            })
        }
        async fn active_manifest_hash(&self, _dispatcher: Address) -> Result<Option<B256>> {
            if !self.dispatcher_deployed {
                return Ok(None);
            }
            Ok(self.on_chain_hash)
        }
    }

    // ---- S6: preflight across several networks fails only the network
    // whose on-chain hash doesn't match, and reports every network. ----
    #[tokio::test]
    async fn preflight_isolates_a_single_divergent_network() {
        let (config, resolver) = two_facet_release();
        let output = compose(&config, &resolver, &base_params()).unwrap();
        let manifest = output.manifest;

        let networks: Vec<(String, Arc<dyn NetworkAccessor>)> = vec![
            (
                "mainnet".to_string(),
                Arc::new(FixedAccessor {
                    chain_id: 1,
                    on_chain_hash: Some(manifest.manifest_hash),
                    dispatcher_deployed: true,
                }),
            ),
            (
                "sepolia".to_string(),
                Arc::new(FixedAccessor {
                    chain_id: 11155111,
                    on_chain_hash: Some(B256::repeat_byte(0x99)),
                    dispatcher_deployed: true,
                }),
            ),
            (
                "not-yet-deployed".to_string(),
                Arc::new(FixedAccessor {
                    chain_id: 84532,
                    on_chain_hash: None,
                    dispatcher_deployed: false,
                }),
            ),
        ];

        let report = preflight::run(&manifest, &networks, &[], None, 4).await;
        assert!(!report.passed);

        let mainnet = report.networks.iter().find(|n| n.network_name == "mainnet").unwrap();
        let sepolia = report.networks.iter().find(|n| n.network_name == "sepolia").unwrap();
        let fresh = report
            .networks
            .iter()
            .find(|n| n.network_name == "not-yet-deployed")
            .unwrap();

        assert!(mainnet.passed);
        assert_eq!(mainnet.checks.on_chain_hash_ok, Some(true));

        assert!(!sepolia.passed);
        assert_eq!(sepolia.checks.on_chain_hash_ok, Some(false));

        assert!(fresh.passed);
        assert_eq!(fresh.checks.on_chain_hash_ok, None);
        assert!(!fresh.warnings.is_empty());
    }

    // ---- A tampered route (codehash edited after persistence) is caught
    // by recomputation, independent of any network call. ----
    #[tokio::test]
    async fn tampering_with_a_persisted_route_fails_static_checks() {
        let (config, resolver) = two_facet_release();
        let output = compose(&config, &resolver, &base_params()).unwrap();
        let mut manifest = output.manifest;
        manifest.routes[0].codehash = B256::repeat_byte(0x77);

        let accessor = FixedAccessor {
            chain_id: 11155111,
            on_chain_hash: None,
            dispatcher_deployed: false,
        };
        let result = preflight::validate_network(&manifest, "sepolia", &[], None, &accessor).await;
        assert!(!result.passed);
        assert!(!result.checks.merkle_root_ok);
    }

    // ---- Preflight with a resolver re-resolves every facet's bytecode and
    // re-derives its CREATE2 address; a manifest whose recorded bytecode
    // hash no longer matches the artifact on disk fails that check alone. ----
    #[tokio::test]
    async fn preflight_with_resolver_catches_a_rebuilt_artifact() {
        let (config, resolver) = two_facet_release();
        let output = compose(&config, &resolver, &base_params()).unwrap();
        let manifest = output.manifest;

        let accessor = FixedAccessor {
            chain_id: 11155111,
            on_chain_hash: None,
            dispatcher_deployed: false,
        };

        let clean = preflight::validate_network(&manifest, "sepolia", &[], Some(&resolver), &accessor).await;
        assert!(clean.passed);
        assert_eq!(clean.checks.bytecode_integrity_ok, Some(true));
        assert_eq!(clean.checks.predicted_addresses_ok, Some(true));

        // Facet recompiled: runtime bytecode at the same contract id changed,
        // so the manifest's recorded bytecodeHash is now stale.
        let mut rebuilt_map = HashMap::new();
        rebuilt_map.insert("TokenFacet".to_string(), facet_artifact(0x01, 0x99, "transfer"));
        rebuilt_map.insert("StakingFacet".to_string(), facet_artifact(0x02, 0x82, "stake"));
        let rebuilt_resolver = FixtureResolver(rebuilt_map);

        let dirty =
            preflight::validate_network(&manifest, "sepolia", &[], Some(&rebuilt_resolver), &accessor).await;
        assert!(!dirty.passed);
        assert_eq!(dirty.checks.bytecode_integrity_ok, Some(false));
    }
}
