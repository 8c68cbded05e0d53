// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error};

use super::Shutdown;
use crate::NetworkInterface;

/// Periodically evicts idle sessions until shutdown is signalled.
///
/// Housekeeping closes sockets, so each pass runs on the blocking pool rather than on a
/// runtime worker.
pub async fn run_house_keeping(
    interface: Arc<NetworkInterface>,
    period: Duration,
    mut shutdown: Shutdown,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately, nothing can be idle yet
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("house keeper received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                let interface = interface.clone();
                let pass = tokio::task::spawn_blocking(move || interface.perform_house_keeping());
                if let Err(e) = pass.await {
                    error!("house keeping pass failed: {}", e);
                }
            }
        }
    }
    debug!("house keeper exited");
}
