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

use std::time::Duration;

use log::warn;

use crate::time_stamp::{
    post_timestamp_query, TimeStampError, TimeStampRequest, TimeStampResponse,
};

/// A client for one [RFC 3161] time stamp service.
///
/// [RFC 3161]: https://www.ietf.org/rfc/rfc3161.txt
pub struct TsaClient {
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    allow_missing_nonce: bool,
}

impl TsaClient {
    /// Build a client for the service at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            allow_missing_nonce: true,
        }
    }

    /// Additional request headers (e.g. `Authorization`), forwarded
    /// verbatim.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Fail the whole operation when the service takes longer than this.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a response that omits the request nonce is acceptable
    /// (default true).
    pub fn with_allow_missing_nonce(mut self, allow: bool) -> Self {
        self.allow_missing_nonce = allow;
        self
    }

    /// Send `request` to the service and return the verified
    /// timeStampToken DER (the enclosing `ContentInfo`).
    ///
    /// Verification covers, in order: the PKI status, the imprint hash
    /// algorithm, the imprint bytes, and the nonce reflection.
    pub fn request_token(&self, request: &TimeStampRequest) -> Result<Vec<u8>, TimeStampError> {
        let body = request.to_der()?;
        let response_bytes = post_timestamp_query(&self.url, &self.headers, self.timeout, &body)?;

        let response = TimeStampResponse::decode(&response_bytes)?;

        if !response.is_success() {
            let status = &response.status;
            return Err(TimeStampError::Rejected {
                status: status.status.into(),
                status_string: status
                    .status_string
                    .as_ref()
                    .map(|s| s.joined())
                    .unwrap_or_default(),
                fail_info: status.fail_info.as_ref().map(|fi| fi.to_string()),
            });
        }

        let tst_info = response
            .tst_info()?
            .ok_or_else(|| TimeStampError::DecodeError("response carries no TSTInfo".to_string()))?;

        let imprint = &tst_info.message_imprint;
        if imprint.hash_algorithm.algorithm != request.digest().oid() {
            return Err(TimeStampError::AlgorithmMismatch);
        }
        if imprint.hashed_message.to_bytes().as_ref() != request.imprint() {
            return Err(TimeStampError::ImprintMismatch);
        }

        match &tst_info.nonce {
            Some(nonce) => {
                if nonce != request.nonce() {
                    return Err(TimeStampError::NonceMismatch);
                }
            }
            None => {
                if self.allow_missing_nonce {
                    warn!("TSA at {} did not reflect the request nonce", self.url);
                } else {
                    return Err(TimeStampError::MissingNonce);
                }
            }
        }

        response
            .token_der()?
            .ok_or_else(|| TimeStampError::DecodeError("response carries no token".to_string()))
    }
}
