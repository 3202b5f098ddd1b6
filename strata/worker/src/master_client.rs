// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Client-side view of the query master protocol.
//!
//! Block supervisors talk to their master through the [QueryMasterClient]
//! trait; the grpc-backed implementation leases a channel from the
//! process-wide [QueryMasterClients] pool per call and releases it right
//! after, so no lease is held across a suspension point longer than one RPC.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tonic::transport::Channel;

use strata_core::error::{Result, StrataError};
use strata_core::serde::master::{ExecutionBlockId, TaskReport};
use strata_core::serde::protobuf;
use strata_core::serde::protobuf::query_master_grpc_client::QueryMasterGrpcClient;
use strata_core::utils::create_grpc_client_connection;

/// Operations the worker invokes on the query master.
#[async_trait]
pub trait QueryMasterClient: Send + Sync {
    /// Liveness signal sent while the block has no active tasks.
    async fn ping(&self, block_id: &ExecutionBlockId) -> Result<()>;

    /// Progress push for one task attempt whose state changed.
    async fn status_update(&self, report: &TaskReport) -> Result<()>;

    /// Final per-block report including the shuffle intermediate layout.
    async fn done_execution_block(
        &self,
        report: protobuf::ExecutionBlockReport,
    ) -> Result<()>;

    /// Best-effort notification that a query cannot run on this worker.
    async fn kill_query(&self, query_id: &str) -> Result<()>;
}

/// Grpc-backed [QueryMasterClient] for one master address.
pub struct GrpcQueryMaster {
    client: QueryMasterGrpcClient<Channel>,
}

impl GrpcQueryMaster {
    /// Wraps an established grpc client.
    pub fn new(client: QueryMasterGrpcClient<Channel>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryMasterClient for GrpcQueryMaster {
    async fn ping(&self, block_id: &ExecutionBlockId) -> Result<()> {
        let mut client = self.client.clone();
        client
            .ping(protobuf::PingParams {
                block_id: Some(block_id.into()),
            })
            .await?;
        Ok(())
    }

    async fn status_update(&self, report: &TaskReport) -> Result<()> {
        let mut client = self.client.clone();
        client
            .status_update(protobuf::UpdateTaskStatusParams {
                status: Some(report.into()),
            })
            .await?;
        Ok(())
    }

    async fn done_execution_block(
        &self,
        report: protobuf::ExecutionBlockReport,
    ) -> Result<()> {
        let mut client = self.client.clone();
        client.done_execution_block(report).await?;
        Ok(())
    }

    async fn kill_query(&self, query_id: &str) -> Result<()> {
        let mut client = self.client.clone();
        client
            .kill_query(protobuf::KillQueryParams {
                query_id: query_id.to_owned(),
            })
            .await?;
        Ok(())
    }
}

/// Creates per-master clients; the seam the tests mock out.
#[async_trait]
pub trait QueryMasterClientFactory: Send + Sync {
    /// Returns a client for the master at `address` (`host:port`).
    async fn client_for(&self, address: &str) -> Result<Arc<dyn QueryMasterClient>>;
}

/// Process-wide pool of master channels, keyed by address. Channels multiplex
/// internally, so handing out a clone per block is the cheap lease.
#[derive(Default)]
pub struct QueryMasterClients {
    clients: DashMap<String, QueryMasterGrpcClient<Channel>>,
}

impl QueryMasterClients {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryMasterClientFactory for QueryMasterClients {
    async fn client_for(&self, address: &str) -> Result<Arc<dyn QueryMasterClient>> {
        if let Some(client) = self.clients.get(address) {
            return Ok(Arc::new(GrpcQueryMaster::new(client.clone())));
        }

        let url = format!("http://{address}");
        let connection = create_grpc_client_connection(url).await.map_err(|e| {
            StrataError::GrpcConnectionError(format!(
                "cannot connect to query master {address}: {e}"
            ))
        })?;
        let client = QueryMasterGrpcClient::new(connection);
        self.clients.insert(address.to_owned(), client.clone());

        Ok(Arc::new(GrpcQueryMaster::new(client)))
    }
}
