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

/// Describes errors that can occur when requesting or verifying an
/// [RFC 3161] time stamp.
///
/// [RFC 3161]: https://www.ietf.org/rfc/rfc3161.txt
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimeStampError {
    /// The TSA did not grant the request.
    #[error("time stamp request rejected (status = {status}): {status_string}")]
    Rejected {
        /// The PKIStatus value returned by the TSA.
        status: u8,

        /// The free-text explanation, empty when the TSA sent none.
        status_string: String,

        /// Rendered failInfo bits, when present.
        fail_info: Option<String>,
    },

    /// The token's message imprint does not match the requested one.
    #[error("time stamp does not match the requested imprint")]
    ImprintMismatch,

    /// The token's hash algorithm differs from the requested one.
    #[error("time stamp hash algorithm does not match the request")]
    AlgorithmMismatch,

    /// The time stamp service did not respond with the same nonce as
    /// provided.
    #[error("nonce mismatch")]
    NonceMismatch,

    /// The response omitted the nonce and the caller requires it.
    #[error("time stamp response is missing the request nonce")]
    MissingNonce,

    /// An error was encountered when decoding the time stamp response.
    #[error("decode error ({0})")]
    DecodeError(String),

    /// The time stamp service responded with an error condition.
    #[error("service responded with an HTTP error (status = {0}, content-type = {1})")]
    HttpErrorResponse(u16, String),

    /// Unable to complete the HTTPS time stamp request.
    ///
    /// This error should be used _only_ if no response is received from the
    /// time stamp service. Any error response from the service should be
    /// described using `HttpErrorResponse`.
    #[error("unable to complete HTTP request ({0})")]
    HttpConnectionError(String),

    /// An I/O error occurred while processing the time stamp response.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// An unexpected internal error occurred while requesting the time
    /// stamp response.
    #[error("internal error ({0})")]
    InternalError(String),
}
