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

//! General utility functions shared by Strata components.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tonic::transport::{Channel, Error};
use tonic::codegen::StdError;

/// Opens a grpc channel to the given destination with the connection tuning
/// used across Strata components.
pub async fn create_grpc_client_connection<D>(dst: D) -> Result<Channel, Error>
where
    D: std::convert::TryInto<tonic::transport::Endpoint>,
    D::Error: Into<StdError>,
{
    let endpoint = tonic::transport::Endpoint::new(dst)?
        .connect_timeout(Duration::from_secs(20))
        .timeout(Duration::from_secs(20))
        // Disable Nagle's Algorithm since we don't want packets to wait
        .tcp_nodelay(true)
        .tcp_keepalive(Option::Some(Duration::from_secs(3600)))
        .http2_keep_alive_interval(Duration::from_secs(300))
        .keep_alive_timeout(Duration::from_secs(20))
        .keep_alive_while_idle(true);
    endpoint.connect().await
}

/// Current wall-clock time in milliseconds since the unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Given an interval, get the epoch time in milliseconds before now.
pub fn get_time_before(interval: Duration) -> u64 {
    current_time_millis().saturating_sub(interval.as_millis() as u64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn time_before_is_in_the_past() {
        let now = current_time_millis();
        let before = get_time_before(Duration::from_secs(60));
        assert!(before <= now);
        assert!(now - before >= 59_000);
    }
}
