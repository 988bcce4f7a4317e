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

//! ASN.1 types defined by [RFC 3161].
//!
//! [RFC 3161]: https://datatracker.ietf.org/doc/html/rfc3161

use bcder::{
    decode::{Constructed, DecodeError, Source},
    encode::{self, PrimitiveContent, Values},
    Captured, Integer, OctetString, Oid, Tag,
};

use crate::asn1::{rfc5652::ContentInfo, AlgorithmIdentifier, GeneralizedTime};

/// A time-stamp request.
///
/// ```ASN.1
/// TimeStampReq ::= SEQUENCE  {
///    version                  INTEGER  { v1(1) },
///    messageImprint           MessageImprint,
///      --a hash algorithm OID and the hash value of the data to be
///      --time-stamped
///    reqPolicy                TSAPolicyId                OPTIONAL,
///    nonce                    INTEGER                    OPTIONAL,
///    certReq                  BOOLEAN                    DEFAULT FALSE,
///    extensions               [0] IMPLICIT Extensions    OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampReq {
    /// Request version; always 1.
    pub version: Integer,

    /// Hash algorithm and hash of the data to be time-stamped.
    pub message_imprint: MessageImprint,

    /// Requested TSA policy, if any.
    pub req_policy: Option<TsaPolicyId>,

    /// Caller-chosen nonce reflected in the response.
    pub nonce: Option<Integer>,

    /// Whether the TSA must include its certificate in the token.
    pub cert_req: Option<bool>,
}

impl TimeStampReq {
    /// Parse one request from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = Integer::take_from(cons)?;
            let message_imprint = MessageImprint::take_from(cons)?;
            let req_policy = Oid::take_opt_from(cons)?;
            let nonce = cons.take_opt_primitive_if(Tag::INTEGER, Integer::from_primitive)?;
            let cert_req = cons.take_opt_bool()?;

            // Extensions are not used by this crate; drop them.
            let _extensions = cons.capture_all()?;

            Ok(Self {
                version,
                message_imprint,
                req_policy,
                nonce,
                cert_req,
            })
        })
    }

    /// Encode this request as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            (&self.version).encode(),
            self.message_imprint.encode_ref(),
            self.req_policy
                .as_ref()
                .map(|req_policy| req_policy.encode_ref()),
            self.nonce.as_ref().map(|nonce| nonce.encode()),
            self.cert_req.as_ref().map(|cert_req| cert_req.encode_ref()),
        ))
    }
}

/// Message imprint.
///
/// ```ASN.1
/// MessageImprint ::= SEQUENCE  {
///      hashAlgorithm                AlgorithmIdentifier,
///      hashedMessage                OCTET STRING  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageImprint {
    /// Hash algorithm used over the imprinted message.
    pub hash_algorithm: AlgorithmIdentifier,

    /// The hash value itself.
    pub hashed_message: OctetString,
}

impl MessageImprint {
    /// Parse one message imprint from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let hash_algorithm = AlgorithmIdentifier::take_from(cons)?;
            let hashed_message = OctetString::take_from(cons)?;

            Ok(Self {
                hash_algorithm,
                hashed_message,
            })
        })
    }

    /// Encode this message imprint as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((&self.hash_algorithm, self.hashed_message.encode_ref()))
    }
}

/// TSA policy identifier.
pub type TsaPolicyId = Oid;

/// Time stamp response.
///
/// ```ASN.1
/// TimeStampResp ::= SEQUENCE  {
///      status                  PKIStatusInfo,
///      timeStampToken          TimeStampToken     OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeStampResp {
    /// The request status reported by the TSA.
    pub status: PkiStatusInfo,

    /// The token, present when the request was granted.
    pub time_stamp_token: Option<TimeStampToken>,
}

impl TimeStampResp {
    /// Parse one response from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let status = PkiStatusInfo::take_from(cons)?;
            let time_stamp_token = ContentInfo::take_opt_from(cons)?;

            Ok(Self {
                status,
                time_stamp_token,
            })
        })
    }

    /// Encode this response as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.status.encode_ref(),
            self.time_stamp_token.as_ref().map(|tst| tst.encode_ref()),
        ))
    }
}

/// PKI status info.
///
/// ```ASN.1
/// PKIStatusInfo ::= SEQUENCE {
///     status        PKIStatus,
///     statusString  PKIFreeText     OPTIONAL,
///     failInfo      PKIFailureInfo  OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PkiStatusInfo {
    /// The coarse status code.
    pub status: PkiStatus,

    /// Human-readable status detail.
    pub status_string: Option<PkiFreeText>,

    /// Failure detail bits.
    pub fail_info: Option<PkiFailureInfo>,
}

impl PkiStatusInfo {
    /// Build a bare status without detail fields.
    pub fn new(status: PkiStatus) -> Self {
        Self {
            status,
            status_string: None,
            fail_info: None,
        }
    }

    /// Parse one status info from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let status = PkiStatus::take_from(cons)?;
            let status_string = PkiFreeText::take_opt_from(cons)?;
            let fail_info = PkiFailureInfo::take_opt_from(cons)?;

            Ok(Self {
                status,
                status_string,
                fail_info,
            })
        })
    }

    /// Encode this status info as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.status.encode(),
            self.status_string.as_ref().map(|s| s.encode_ref()),
        ))
    }
}

/// PKI status.
///
/// ```ASN.1
/// PKIStatus ::= INTEGER {
///     granted                (0),
///     grantedWithMods        (1),
///     rejection              (2),
///     waiting                (3),
///     revocationWarning      (4),
///     revocationNotification (5) }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PkiStatus {
    /// A token as requested is present.
    Granted = 0,
    /// A token with modifications is present.
    GrantedWithMods = 1,
    /// The request was rejected.
    Rejection = 2,
    /// The request has not yet been processed.
    Waiting = 3,
    /// A revocation is imminent.
    RevocationWarning = 4,
    /// A revocation has occurred.
    RevocationNotification = 5,
}

impl PkiStatus {
    /// Parse one status from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        match cons.take_primitive_if(Tag::INTEGER, Integer::i8_from_primitive)? {
            0 => Ok(Self::Granted),
            1 => Ok(Self::GrantedWithMods),
            2 => Ok(Self::Rejection),
            3 => Ok(Self::Waiting),
            4 => Ok(Self::RevocationWarning),
            5 => Ok(Self::RevocationNotification),
            _ => Err(cons.content_err("unknown PKIStatus value")),
        }
    }

    /// Encode this status as a DER INTEGER.
    pub fn encode(self) -> impl Values {
        u8::from(self).encode()
    }
}

impl From<PkiStatus> for u8 {
    fn from(v: PkiStatus) -> u8 {
        v as u8
    }
}

/// Free-form status text.
///
/// ```ASN.1
/// PKIFreeText ::= SEQUENCE SIZE (1..MAX) OF UTF8String
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PkiFreeText(Vec<String>);

impl PkiFreeText {
    /// Wrap a list of text lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// Parse an optional free-text value from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let Some(captured) = cons.take_opt_constructed_if(Tag::SEQUENCE, |cons| cons.capture_all())?
        else {
            return Ok(None);
        };

        let mut lines = Vec::new();
        let parts = crate::asn1::split_der_values(captured.as_slice())
            .map_err(|e| cons.content_err(e))?;
        for part in parts {
            let content = crate::asn1::der_content(&part).map_err(|e| cons.content_err(e))?;
            lines.push(String::from_utf8_lossy(content).into_owned());
        }

        Ok(Some(Self(lines)))
    }

    /// The contained text lines.
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// All lines joined with `"; "`, for diagnostics.
    pub fn joined(&self) -> String {
        self.0.join("; ")
    }

    /// Encode this free text as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence(encode::iter(
            self.0
                .iter()
                .map(|line| line.as_bytes().encode_as(Tag::UTF8_STRING)),
        ))
    }
}

/// PKI failure info, a named-bit BIT STRING.
///
/// ```ASN.1
/// PKIFailureInfo ::= BIT STRING {
///     badAlg               (0),
///     badRequest           (2),
///     badDataFormat        (5),
///     timeNotAvailable    (14),
///     unacceptedPolicy    (15),
///     unacceptedExtension (16),
///     addInfoNotAvailable (17),
///     systemFailure       (25) }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PkiFailureInfo(u32);

impl PkiFailureInfo {
    /// Parse an optional failure info from a constructed value.
    ///
    /// Accepts the BIT STRING form mandated by the RFC as well as the
    /// INTEGER form some servers emit.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        if let Some(bits) = cons.take_opt_primitive_if(Tag::BIT_STRING, |prim| {
            let bytes = prim.take_all()?;
            let mut bits = 0u32;
            for (i, b) in bytes.as_ref().iter().skip(1).take(4).enumerate() {
                bits |= (*b as u32) << (24 - 8 * i);
            }
            Ok(bits)
        })? {
            return Ok(Some(Self(bits)));
        }

        if let Some(v) = cons.take_opt_primitive_if(Tag::INTEGER, Integer::i8_from_primitive)? {
            return Ok(Some(Self(0x8000_0000u32 >> v.clamp(0, 31))));
        }

        Ok(None)
    }

    /// Whether the named bit (msb-first) is set.
    pub fn bit(&self, n: u8) -> bool {
        n < 32 && self.0 & (0x8000_0000 >> n) != 0
    }
}

impl std::fmt::Display for PkiFailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: &[(u8, &str)] = &[
            (0, "badAlg"),
            (2, "badRequest"),
            (5, "badDataFormat"),
            (14, "timeNotAvailable"),
            (15, "unacceptedPolicy"),
            (16, "unacceptedExtension"),
            (17, "addInfoNotAvailable"),
            (25, "systemFailure"),
        ];

        let mut first = true;
        for (bit, name) in NAMES {
            if self.bit(*bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Time stamp token.
///
/// ```ASN.1
/// TimeStampToken ::= ContentInfo
/// ```
pub type TimeStampToken = ContentInfo;

/// Time stamp token info.
///
/// ```ASN.1
/// TSTInfo ::= SEQUENCE  {
///     version                      INTEGER  { v1(1) },
///     policy                       TSAPolicyId,
///     messageImprint               MessageImprint,
///     serialNumber                 INTEGER,
///     genTime                      GeneralizedTime,
///     accuracy                     Accuracy                 OPTIONAL,
///     ordering                     BOOLEAN             DEFAULT FALSE,
///     nonce                        INTEGER                  OPTIONAL,
///     tsa                          [0] GeneralName          OPTIONAL,
///     extensions                   [1] IMPLICIT Extensions  OPTIONAL   }
/// ```
#[derive(Clone, Debug)]
pub struct TstInfo {
    /// Token version; always 1.
    pub version: Integer,

    /// The policy under which the token was issued.
    pub policy: TsaPolicyId,

    /// Must equal the imprint from the request.
    pub message_imprint: MessageImprint,

    /// TSA-assigned token serial number.
    pub serial_number: Integer,

    /// The certified time.
    pub gen_time: GeneralizedTime,

    /// Declared accuracy of `gen_time`.
    pub accuracy: Option<Accuracy>,

    /// Whether tokens from this TSA are strictly ordered by `gen_time`.
    pub ordering: Option<bool>,

    /// Must equal the request nonce when one was sent.
    pub nonce: Option<Integer>,

    /// TSA name; preserved but not interpreted.
    pub tsa: Option<Captured>,
}

impl PartialEq for TstInfo {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.policy == other.policy
            && self.message_imprint == other.message_imprint
            && self.serial_number == other.serial_number
            && self.gen_time == other.gen_time
            && self.accuracy == other.accuracy
            && self.ordering == other.ordering
            && self.nonce == other.nonce
            && self.tsa.as_ref().map(Captured::as_slice) == other.tsa.as_ref().map(Captured::as_slice)
    }
}

impl Eq for TstInfo {}

impl TstInfo {
    /// Parse one token info from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = Integer::take_from(cons)?;
            let policy = Oid::take_from(cons)?;
            let message_imprint = MessageImprint::take_from(cons)?;
            let serial_number = Integer::take_from(cons)?;
            let gen_time = GeneralizedTime::take_from(cons)?;
            let accuracy = Accuracy::take_opt_from(cons)?;
            let ordering = cons.take_opt_bool()?;
            let nonce = cons.take_opt_primitive_if(Tag::INTEGER, Integer::from_primitive)?;
            let tsa = cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;

            // Extensions are not used by this crate; drop them.
            let _extensions = cons.capture_all()?;

            Ok(Self {
                version,
                policy,
                message_imprint,
                serial_number,
                gen_time,
                accuracy,
                ordering,
                nonce,
                tsa,
            })
        })
    }

    /// Encode this token info as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            (&self.version).encode(),
            self.policy.encode_ref(),
            self.message_imprint.encode_ref(),
            (&self.serial_number).encode(),
            self.gen_time.encode_ref(),
            self.accuracy.as_ref().map(|accuracy| accuracy.encode_ref()),
            self.ordering.as_ref().map(|ordering| ordering.encode_ref()),
            self.nonce.as_ref().map(|nonce| nonce.encode()),
        ))
    }
}

/// Accuracy of the certified time.
///
/// ```ASN.1
/// Accuracy ::= SEQUENCE {
///                 seconds        INTEGER           OPTIONAL,
///                 millis     [0] INTEGER  (1..999) OPTIONAL,
///                 micros     [1] INTEGER  (1..999) OPTIONAL  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Accuracy {
    /// Whole seconds.
    pub seconds: Option<Integer>,

    /// Milliseconds.
    pub millis: Option<Integer>,

    /// Microseconds.
    pub micros: Option<Integer>,
}

impl Accuracy {
    /// Parse an optional accuracy from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let seconds = cons.take_opt_primitive_if(Tag::INTEGER, Integer::from_primitive)?;
            let millis = cons.take_opt_primitive_if(Tag::CTX_0, Integer::from_primitive)?;
            let micros = cons.take_opt_primitive_if(Tag::CTX_1, Integer::from_primitive)?;

            Ok(Self {
                seconds,
                millis,
                micros,
            })
        })
    }

    /// Encode this accuracy as DER values.
    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.seconds.as_ref().map(|seconds| seconds.encode()),
            self.millis.as_ref().map(|millis| millis.encode()),
            self.micros.as_ref().map(|micros| micros.encode()),
        ))
    }
}
