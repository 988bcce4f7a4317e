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

use bcder::decode::Constructed;

use crate::{
    asn1::{
        rfc3161::{PkiStatus, TimeStampResp, TstInfo},
        rfc5652::SignedData,
        to_der,
    },
    oids::{OID_CONTENT_TYPE_TST_INFO, OID_ID_SIGNED_DATA},
    time_stamp::TimeStampError,
};

/// High-level interface to a decoded TimeStampResp.
pub struct TimeStampResponse(TimeStampResp);

impl std::ops::Deref for TimeStampResponse {
    type Target = TimeStampResp;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TimeStampResponse {
    /// Decode a response from its raw bytes.
    ///
    /// TSAs in the wild emit BER length forms; decoding is therefore
    /// permissive.
    pub fn decode(response_bytes: &[u8]) -> Result<Self, TimeStampError> {
        let resp = Constructed::decode(response_bytes, bcder::Mode::Ber, |cons| {
            TimeStampResp::take_from(cons)
        })
        .map_err(|e| TimeStampError::DecodeError(e.to_string()))?;

        Ok(Self(resp))
    }

    /// Whether the time stamp request was successful.
    pub fn is_success(&self) -> bool {
        matches!(
            self.0.status.status,
            PkiStatus::Granted | PkiStatus::GrantedWithMods
        )
    }

    /// Decode the `SignedData` value in the response token.
    pub fn signed_data(&self) -> Result<Option<SignedData>, TimeStampError> {
        if let Some(token) = &self.0.time_stamp_token {
            if token.content_type == OID_ID_SIGNED_DATA {
                match &token.content {
                    Some(content) => Ok(Some(
                        content
                            .clone()
                            .decode(SignedData::take_from)
                            .map_err(|e| TimeStampError::DecodeError(e.to_string()))?,
                    )),
                    None => Ok(None),
                }
            } else {
                Err(TimeStampError::DecodeError(
                    "invalid OID for signed data".to_string(),
                ))
            }
        } else {
            Ok(None)
        }
    }

    /// Decode the TSTInfo carried inside the response token.
    pub fn tst_info(&self) -> Result<Option<TstInfo>, TimeStampError> {
        if let Some(signed_data) = self.signed_data()? {
            if signed_data.content_info.content_type == OID_CONTENT_TYPE_TST_INFO {
                if let Some(content) = signed_data.content_info.content {
                    Ok(Some(
                        Constructed::decode(content.to_bytes(), bcder::Mode::Ber, |cons| {
                            TstInfo::take_from(cons)
                        })
                        .map_err(|e| TimeStampError::DecodeError(e.to_string()))?,
                    ))
                } else {
                    Ok(None)
                }
            } else {
                Ok(None)
            }
        } else {
            Ok(None)
        }
    }

    /// Re-serialize the timeStampToken (the enclosing `ContentInfo`) as DER.
    ///
    /// These are the bytes embedded in an unsigned signature-time-stamp
    /// attribute or in a DocTimeStamp `/Contents`.
    pub fn token_der(&self) -> Result<Option<Vec<u8>>, TimeStampError> {
        match &self.0.time_stamp_token {
            Some(token) => Ok(Some(to_der(token.encode_ref())?)),
            None => Ok(None),
        }
    }
}
