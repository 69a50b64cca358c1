// Copyright 2023 Google LLC
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


//! Resource graph specifications.
//!
//! Both the substrate and the virtual network requests are resource graphs:
//! nodes carrying named resources and links carrying bandwidth. The substrate
//! holds capacities, the requests hold demands.

use crate::error::Error;

mod link;
mod node;
mod system;

pub use link::LinkSpec;
pub use node::NodeSpec;
pub use node::DEFAULT_RESOURCE;
pub use system::GraphId;
pub use system::ResourceGraph;

/// Values closer than this are considered equal when checking capacities.
pub const TOLERANCE: f64 = 1e-9;

/// Capacities and demands are finite and non negative.
pub fn check_amount(what: &str, amount: f64) -> Result<f64, Error> {
    if amount >= 0.0 && amount.is_finite() {
        Ok(amount)
    } else {
        Err(Error::InvalidParameter(format!(
            "{} must be a finite, non negative amount, got {}",
            what, amount
        )))
    }
}
