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

//! Rust struct definitions for the ASN.1 structures this crate reads and
//! writes, built on `bcder`.
//!
//! Each structure follows the same pattern as the `cryptographic-message-syntax`
//! lineage: a `take_from` decoder paired with an `encode_ref` producing
//! `bcder::encode::Values`.

use std::io::Write;

use bcder::{
    decode::{Constructed, DecodeError, Source},
    encode::{self, PrimitiveContent, Values},
    Mode, Oid, Tag,
};

pub mod rfc3161;
pub mod rfc5652;

/// Algorithm identifier.
///
/// ```ASN.1
/// AlgorithmIdentifier ::= SEQUENCE {
///     algorithm   OBJECT IDENTIFIER,
///     parameters  ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// Parameters other than an absent value or NULL are skipped on read. RSA
/// signature and digest algorithm identifiers conventionally carry an
/// explicit NULL; set `emit_null_params` to reproduce that on write.
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    /// The algorithm OID.
    pub algorithm: Oid,

    /// Emit an explicit NULL parameter when encoding.
    pub emit_null_params: bool,
}

impl PartialEq for AlgorithmIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm
    }
}

impl Eq for AlgorithmIdentifier {}

impl AlgorithmIdentifier {
    /// Build an identifier without parameters.
    pub fn new(algorithm: Oid) -> Self {
        Self {
            algorithm,
            emit_null_params: false,
        }
    }

    /// Build an identifier carrying an explicit NULL parameter.
    pub fn new_with_null(algorithm: Oid) -> Self {
        Self {
            algorithm,
            emit_null_params: true,
        }
    }

    /// Parse one identifier from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let algorithm = Oid::take_from(cons)?;
            let params = cons.capture_all()?;

            Ok(Self {
                algorithm,
                emit_null_params: params.as_slice() == [0x05, 0x00],
            })
        })
    }

    /// Parse an optional identifier from a constructed value.
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let algorithm = Oid::take_from(cons)?;
            let params = cons.capture_all()?;

            Ok(Self {
                algorithm,
                emit_null_params: params.as_slice() == [0x05, 0x00],
            })
        })
    }
}

impl Values for AlgorithmIdentifier {
    fn encoded_len(&self, mode: Mode) -> usize {
        if self.emit_null_params {
            encode::sequence((self.algorithm.encode_ref(), ().encode())).encoded_len(mode)
        } else {
            encode::sequence(self.algorithm.encode_ref()).encoded_len(mode)
        }
    }

    fn write_encoded<W: Write>(&self, mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        if self.emit_null_params {
            encode::sequence((self.algorithm.encode_ref(), ().encode()))
                .write_encoded(mode, target)
        } else {
            encode::sequence(self.algorithm.encode_ref()).write_encoded(mode, target)
        }
    }
}

/// Generalized time, stored as the raw `YYYYMMDDHHMMSS[.f*]Z` text.
///
/// TSA responses occasionally carry fractional seconds; those are preserved
/// on read and stripped by [`GeneralizedTime::as_seconds_str`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneralizedTime(String);

impl GeneralizedTime {
    /// Build from a UTC timestamp.
    pub fn from_datetime(dt: &chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt.format("%Y%m%d%H%M%SZ").to_string())
    }

    /// Parse one GeneralizedTime from a constructed value.
    pub fn take_from<S: Source>(cons: &mut Constructed<S>) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive_if(Tag::GENERALIZED_TIME, |prim| {
            let bytes = prim.take_all()?;
            match std::str::from_utf8(bytes.as_ref()) {
                Ok(s) => Ok(Self(s.to_string())),
                Err(_) => Err(prim.content_err("invalid GeneralizedTime")),
            }
        })
    }

    /// The raw time string, fractional seconds included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The time string truncated to whole seconds, `Z`-terminated.
    pub fn as_seconds_str(&self) -> String {
        let s = self.0.trim_end_matches('Z');
        let (s, _frac) = s.split_once('.').unwrap_or((s, ""));
        format!("{s}Z")
    }

    /// Encode this time as a DER value.
    pub fn encode_ref(&self) -> impl Values + '_ {
        self.0.as_bytes().encode_as(Tag::GENERALIZED_TIME)
    }
}

/// Serialize `values` to a DER byte vector.
pub fn to_der(values: impl Values) -> Result<Vec<u8>, std::io::Error> {
    let mut out = Vec::new();
    values.write_encoded(Mode::Der, &mut out)?;
    Ok(out)
}

/// A pre-encoded DER value (or value sequence) spliced verbatim into an
/// `encode::Values` composition.
pub struct RawDer<'a>(pub &'a [u8]);

impl Values for RawDer<'_> {
    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: Write>(&self, _mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        target.write_all(self.0)
    }
}

/// An INTEGER whose content bytes are emitted exactly as captured, used for
/// certificate serial numbers carried over verbatim.
pub struct RawInteger<'a>(pub &'a [u8]);

impl PrimitiveContent for RawInteger<'_> {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: Write>(&self, _mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        target.write_all(self.0)
    }
}

/// Wrap already-encoded content in an outer tag with a DER length.
///
/// Used for the constructed tags `bcder`'s combinators don't cover here:
/// the `SET OF` signing form of signed attributes (tag `0x31`), the
/// `[0]`/`[1] IMPLICIT` attribute and certificate sets (`0xa0`/`0xa1`), and
/// the `[4]` directoryName wrapper (`0xa4`).
pub fn wrap_der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 5);
    out.push(tag);
    push_der_len(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

fn push_der_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

/// Split a run of concatenated DER TLVs into individual encodings.
///
/// Handles low-tag-number form and both length forms, which covers every
/// structure this crate re-reads (attribute values, certificate sets).
pub fn split_der_values(mut blob: &[u8]) -> Result<Vec<Vec<u8>>, &'static str> {
    let mut out = Vec::new();
    while !blob.is_empty() {
        let len = der_value_len(blob)?;
        out.push(blob[..len].to_vec());
        blob = &blob[len..];
    }
    Ok(out)
}

/// Total length (header + content) of the DER value starting at `blob[0]`.
pub(crate) fn der_value_len(blob: &[u8]) -> Result<usize, &'static str> {
    if blob.len() < 2 {
        return Err("truncated DER value");
    }
    if blob[0] & 0x1f == 0x1f {
        return Err("high tag numbers not supported");
    }

    let first = blob[1];
    if first < 0x80 {
        let total = 2 + first as usize;
        if blob.len() < total {
            return Err("truncated DER value");
        }
        return Ok(total);
    }

    let n = (first & 0x7f) as usize;
    if n == 0 || n > 8 || blob.len() < 2 + n {
        return Err("unsupported DER length");
    }
    let mut len = 0usize;
    for b in &blob[2..2 + n] {
        len = len
            .checked_mul(256)
            .and_then(|l| l.checked_add(*b as usize))
            .ok_or("unsupported DER length")?;
    }
    let total = 2 + n + len;
    if blob.len() < total {
        return Err("truncated DER value");
    }
    Ok(total)
}

/// Content bytes of a single DER TLV (strips tag and length).
pub fn der_content(value: &[u8]) -> Result<&[u8], &'static str> {
    if value.len() < 2 {
        return Err("truncated DER value");
    }
    let first = value[1];
    if first < 0x80 {
        return Ok(&value[2..]);
    }
    let n = (first & 0x7f) as usize;
    if value.len() < 2 + n {
        return Err("truncated DER value");
    }
    Ok(&value[2 + n..])
}
