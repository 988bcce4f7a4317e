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

use thiserror::Error;

use crate::{raw_signature::RawSignerError, time_stamp::TimeStampError};

/// Describes errors that can occur while preparing or signing a PDF.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The input PDF could not be parsed: missing `startxref`/`trailer`,
    /// unbalanced dictionaries, or an unresolvable `/Root`/`/Pages` chain.
    #[error("malformed PDF: {0}")]
    PdfMalformed(String),

    /// No empty signature field was found, or a field with the requested
    /// name does not exist.
    #[error("signature field not found: {0}")]
    FieldMissing(String),

    /// The hex-encoded CMS is larger than the reserved `/Contents`
    /// placeholder.
    #[error("CMS needs {needed} hex digits but the placeholder holds {capacity}")]
    PlaceholderTooSmall {
        /// Hex digits required by the CMS to embed.
        needed: usize,
        /// Hex capacity reserved at placeholder time.
        capacity: usize,
    },

    /// An unknown digest name, curve, or signature algorithm was requested.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signing certificate could not be parsed or its subject public key
    /// info could not be interpreted.
    #[error("invalid certificate: {0}")]
    CertInvalid(String),

    /// An error was reported while producing the raw signature.
    #[error(transparent)]
    Signer(#[from] RawSignerError),

    /// An error was reported by the RFC 3161 client.
    #[error(transparent)]
    TimeStamp(#[from] TimeStampError),

    /// The caller-supplied stamp image could not be decoded or embedded.
    #[error("invalid stamp image: {0}")]
    Stamp(String),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
