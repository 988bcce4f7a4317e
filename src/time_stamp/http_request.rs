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

use std::{io::Read, time::Duration};

use crate::time_stamp::TimeStampError;

const HTTP_CONTENT_TYPE_REQUEST: &str = "application/timestamp-query";
const HTTP_CONTENT_TYPE_RESPONSE: &str = "application/timestamp-reply";

// Responses larger than this are not time stamps.
const MAX_RESPONSE_BYTES: u64 = 1_000_000;

/// POST a DER TimeStampReq to `url` and return the raw response body.
///
/// Caller-supplied headers are forwarded verbatim; the `Content-Type`
/// header is always set by this function. Up to three redirects are
/// followed.
pub(crate) fn post_timestamp_query(
    url: &str,
    headers: &[(String, String)],
    timeout: Duration,
    body: &[u8],
) -> Result<Vec<u8>, TimeStampError> {
    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .redirects(3)
        .build();

    let mut req = agent.post(url);
    for (name, value) in headers {
        req = req.set(name.as_str(), value.as_str());
    }

    let response = req
        .set("Content-Type", HTTP_CONTENT_TYPE_REQUEST)
        .send_bytes(body)?;

    if response.status() != 200 || response.content_type() != HTTP_CONTENT_TYPE_RESPONSE {
        return Err(TimeStampError::HttpErrorResponse(
            response.status(),
            response.content_type().to_string(),
        ));
    }

    let len = response
        .header("Content-Length")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(20000);

    let mut response_bytes: Vec<u8> = Vec::with_capacity(len);
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut response_bytes)?;

    Ok(response_bytes)
}

impl From<ureq::Error> for TimeStampError {
    fn from(err: ureq::Error) -> Self {
        match err {
            // The `ureq::Error` type is very large; capture only what the
            // caller can act on.
            ureq::Error::Status(code, response) => {
                Self::HttpErrorResponse(code, response.content_type().to_string())
            }
            ureq::Error::Transport(t) => Self::HttpConnectionError(t.to_string()),
        }
    }
}
