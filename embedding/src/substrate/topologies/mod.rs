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


//! Generators for common substrate shapes. All nodes and links of a
//! generated substrate share one provisioning configuration.

mod full;
mod line;
mod mesh;
mod random;
mod star;

pub use full::fully_connected;
pub use line::line;
pub use mesh::mesh;
pub use random::random;
pub use star::star;

/// return the linear index of the element in a multi-dimensional grid
/// The element is represented as a vector of coordinates in `dims`.
fn linearize_index(elem: &[usize], dims: &[usize]) -> usize {
    let mut index: usize = 0;
    for (d, c) in elem.iter().enumerate() {
        index += c * dims[0..d].iter().product::<usize>();
    }
    index
}

/// given a linear index of the element, return the vector of coordinates in a
/// multi-dimensional grid of `dims` dimensions.
fn delinearize_index(index: usize, dims: &[usize]) -> Vec<usize> {
    let mut idx = index;
    let mut elem = vec![0; dims.len()];
    for d in (0..dims.len()).rev() {
        let prod = dims[0..d].iter().product::<usize>();
        elem[d] = idx / prod;
        idx -= elem[d] * prod;
    }
    elem
}
