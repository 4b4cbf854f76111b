// Copyright 2025 Cronwheel Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Production engine over `etcd-client`.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, EventType, GetOptions, SortOrder,
    SortTarget, Txn, TxnOp, TxnOpResponse,
};
use snafu::ResultExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    CoordinatorConfig, Error, Result,
    engine::{KvEngine, Watch},
    error::{LeaseNotFoundSnafu, TransportSnafu},
    types::{
        CasOutcome, CreateRevisionOrder, KeyValue, LeaseId, PutOptions, RangeOptions, RangeResult,
        WatchEvent, WatchEventKind,
    },
};

/// Engine backed by an etcd-class coordinator.
///
/// The underlying client multiplexes one gRPC channel; cloning it is
/// cheap, so each operation clones rather than serializing callers
/// behind a mutex.
#[derive(Clone)]
pub struct EtcdEngine {
    client: Client,
}

impl EtcdEngine {
    /// Dial the coordinator.
    pub async fn connect(config: &CoordinatorConfig) -> Result<Self> {
        let options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        let client = Client::connect(&config.endpoints, Some(options))
            .await
            .context(TransportSnafu)?;
        debug!(endpoints = ?config.endpoints, "connected to coordinator");
        Ok(Self { client })
    }
}

fn convert_kv(kv: &etcd_client::KeyValue) -> KeyValue {
    KeyValue {
        key:             String::from_utf8_lossy(kv.key()).into_owned(),
        value:           kv.value().to_vec(),
        create_revision: kv.create_revision(),
        mod_revision:    kv.mod_revision(),
        lease:           kv.lease(),
    }
}

fn range_options(opts: RangeOptions) -> GetOptions {
    let mut options = GetOptions::new();
    if opts.prefix {
        options = options.with_prefix();
    }
    if opts.keys_only {
        options = options.with_keys_only();
    }
    if let Some(order) = opts.sort {
        let order = match order {
            CreateRevisionOrder::Ascending => SortOrder::Ascend,
            CreateRevisionOrder::Descending => SortOrder::Descend,
        };
        options = options.with_sort(SortTarget::Create, order);
    }
    if let Some(limit) = opts.limit {
        options = options.with_limit(limit as i64);
    }
    if let Some(rev) = opts.min_create_revision {
        options = options.with_min_create_revision(rev);
    }
    options
}

#[async_trait]
impl KvEngine for EtcdEngine {
    async fn put(&self, key: &str, value: Vec<u8>, opts: PutOptions) -> Result<Option<KeyValue>> {
        let mut options = etcd_client::PutOptions::new();
        if let Some(lease) = opts.lease {
            options = options.with_lease(lease);
        }
        if opts.prev_kv {
            options = options.with_prev_key();
        }
        let mut client = self.client.clone();
        let response = client
            .put(key, value, Some(options))
            .await
            .context(TransportSnafu)?;
        Ok(response.prev_key().map(convert_kv))
    }

    async fn range(&self, key: &str, opts: RangeOptions) -> Result<RangeResult> {
        let mut client = self.client.clone();
        let response = client
            .get(key, Some(range_options(opts)))
            .await
            .context(TransportSnafu)?;
        let revision = response.header().map_or(0, |h| h.revision());
        Ok(RangeResult {
            revision,
            kvs: response.kvs().iter().map(convert_kv).collect(),
        })
    }

    async fn delete(&self, key: &str, prev_kv: bool) -> Result<Option<KeyValue>> {
        let mut options = DeleteOptions::new();
        if prev_kv {
            options = options.with_prev_key();
        }
        let mut client = self.client.clone();
        let response = client
            .delete(key, Some(options))
            .await
            .context(TransportSnafu)?;
        Ok(response.prev_kvs().first().map(convert_kv))
    }

    async fn watch(&self, prefix: &str, start_revision: i64, prev_kv: bool) -> Result<Watch> {
        let mut options = etcd_client::WatchOptions::new()
            .with_prefix()
            .with_start_revision(start_revision);
        if prev_kv {
            options = options.with_prev_key();
        }

        let mut client = self.client.clone();
        let (watcher, mut stream) = client
            .watch(prefix, Some(options))
            .await
            .context(TransportSnafu)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            // Keep the watcher alive for the lifetime of the stream; etcd
            // cancels the watch when it drops.
            let _watcher = watcher;
            loop {
                match stream.message().await {
                    Ok(Some(response)) => {
                        if response.canceled() {
                            warn!(prefix, "coordinator canceled the watch");
                            break;
                        }
                        let batch: Vec<WatchEvent> = response
                            .events()
                            .iter()
                            .map(|event| WatchEvent {
                                kind: match event.event_type() {
                                    EventType::Put => WatchEventKind::Put,
                                    EventType::Delete => WatchEventKind::Delete,
                                },
                                kv:   event.kv().map(convert_kv).unwrap_or(KeyValue {
                                    key:             String::new(),
                                    value:           Vec::new(),
                                    create_revision: 0,
                                    mod_revision:    0,
                                    lease:           0,
                                }),
                                prev: event.prev_kv().map(convert_kv),
                            })
                            .collect();
                        if !batch.is_empty() && tx.send(Ok(batch)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(source) => {
                        let _ = tx.send(Err(Error::Transport {
                            source,
                            loc: snafu::location!(),
                        }));
                        break;
                    }
                }
            }
        });

        Ok(Watch::new(rx))
    }

    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId> {
        let mut client = self.client.clone();
        let response = client
            .lease_grant(ttl.as_secs() as i64, None)
            .await
            .context(TransportSnafu)?;
        Ok(response.id())
    }

    async fn lease_keep_alive_once(&self, lease: LeaseId) -> Result<Duration> {
        let mut client = self.client.clone();
        let (mut keeper, mut stream) = client
            .lease_keep_alive(lease)
            .await
            .context(TransportSnafu)?;
        keeper.keep_alive().await.context(TransportSnafu)?;
        let response = stream
            .message()
            .await
            .context(TransportSnafu)?
            .ok_or_else(|| Error::LeaseNotFound {
                lease,
                loc: snafu::location!(),
            })?;
        // The coordinator answers keep-alives for expired leases with a
        // zero TTL instead of an error.
        if response.ttl() <= 0 {
            return LeaseNotFoundSnafu { lease }.fail();
        }
        Ok(Duration::from_secs(response.ttl() as u64))
    }

    async fn lease_revoke(&self, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        client.lease_revoke(lease).await.context(TransportSnafu)?;
        Ok(())
    }

    async fn acquire(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<CasOutcome> {
        let txn = Txn::new()
            .when(vec![Compare::create_revision(key, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(
                key,
                value,
                Some(etcd_client::PutOptions::new().with_lease(lease)),
            )])
            .or_else(vec![TxnOp::get(key, None)]);

        let mut client = self.client.clone();
        let response = client.txn(txn).await.context(TransportSnafu)?;

        if response.succeeded() {
            return Ok(CasOutcome::Acquired);
        }
        let current = response.op_responses().into_iter().find_map(|op| match op {
            TxnOpResponse::Get(get) => get.kvs().first().map(convert_kv),
            _ => None,
        });
        Ok(CasOutcome::Held { current })
    }
}
