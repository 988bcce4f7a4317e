// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Byte-level PDF reading and incremental writing.
//!
//! The reader walks the classical cross-reference chain of an existing
//! document; the writer appends incremental updates that add or revise
//! objects, including the signature placeholder whose `/Contents` is later
//! spliced in place.

pub mod appearance;
pub(crate) mod object;
pub mod reader;
pub mod writer;

pub use reader::Document;
pub use writer::{Placeholder, PlaceholderOptions, SubFilter};
