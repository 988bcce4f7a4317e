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

use bcder::{Integer, OctetString, Oid};
use bytes::Bytes;
use rand::{thread_rng, Rng};

use crate::{
    asn1::{
        rfc3161::{MessageImprint, TimeStampReq},
        to_der, AlgorithmIdentifier,
    },
    oids::DigestAlgorithm,
    time_stamp::TimeStampError,
};

/// A TimeStampReq under construction.
///
/// The request carries a fresh random nonce (8 bytes by default) and asks
/// the TSA to include its certificate.
pub struct TimeStampRequest {
    digest: DigestAlgorithm,
    imprint: Vec<u8>,
    policy: Option<Oid<Bytes>>,
    cert_req: bool,
    nonce: Integer,
}

impl TimeStampRequest {
    /// Start a request for the given message imprint, which must be a hash
    /// produced with `digest`.
    pub fn new(imprint: Vec<u8>, digest: DigestAlgorithm) -> Result<Self, TimeStampError> {
        Ok(Self {
            digest,
            imprint,
            policy: None,
            cert_req: true,
            nonce: fresh_nonce(8)?,
        })
    }

    /// Request a specific TSA policy.
    pub fn with_policy(mut self, policy: Oid<Bytes>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Control whether the TSA must embed its certificate (default true).
    pub fn with_cert_req(mut self, cert_req: bool) -> Self {
        self.cert_req = cert_req;
        self
    }

    /// Regenerate the nonce with the given width in bytes.
    ///
    /// Widths are clamped to the 1..=8 range the INTEGER nonce is built
    /// from.
    pub fn with_nonce_bytes(mut self, nonce_bytes: usize) -> Result<Self, TimeStampError> {
        self.nonce = fresh_nonce(nonce_bytes.clamp(1, 8))?;
        Ok(self)
    }

    /// The digest algorithm declared in the message imprint.
    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    /// The imprint bytes.
    pub fn imprint(&self) -> &[u8] {
        &self.imprint
    }

    /// The request nonce.
    pub fn nonce(&self) -> &Integer {
        &self.nonce
    }

    /// Serialize the request as DER.
    pub fn to_der(&self) -> Result<Vec<u8>, TimeStampError> {
        let req = TimeStampReq {
            version: Integer::from(1_u8),
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifier::new_with_null(Oid(Bytes::copy_from_slice(
                    self.digest.oid().0,
                ))),
                hashed_message: OctetString::new(Bytes::copy_from_slice(&self.imprint)),
            },
            req_policy: self.policy.clone(),
            nonce: Some(self.nonce.clone()),
            cert_req: Some(self.cert_req),
        };

        Ok(to_der(req.encode_ref())?)
    }
}

// A non-negative INTEGER nonce of up to eight random bytes. `bcder`
// handles the minimal encoding and high-bit padding.
fn fresh_nonce(width: usize) -> Result<Integer, TimeStampError> {
    let mut random = [0u8; 8];
    thread_rng()
        .try_fill(&mut random)
        .map_err(|_| TimeStampError::InternalError("unable to generate random nonce".to_string()))?;

    let mut value = u64::from_le_bytes(random);
    if width < 8 {
        value &= (1u64 << (8 * width)) - 1;
    }

    Ok(Integer::from(value))
}
