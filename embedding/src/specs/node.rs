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


use std::collections::BTreeMap;

/// The resource type used when a node is declared with a single scalar
/// capacity or demand.
pub const DEFAULT_RESOURCE: &str = "cpu";

/// Common interface of substrate and virtual nodes.
pub trait NodeSpec {
    fn name(&self) -> &str;

    /// The amount of each resource type this node offers (substrate) or
    /// asks for (virtual). For substrate nodes this is the remaining amount.
    fn resource_amounts(&self) -> BTreeMap<String, f64>;

    /// Sum over all resource types, used to rank nodes.
    fn total(&self) -> f64 {
        self.resource_amounts().values().sum()
    }
}
