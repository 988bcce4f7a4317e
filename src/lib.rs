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

//! PAdES-T and document-timestamp signing for PDF files.
//!
//! This crate appends an incremental update to an existing PDF that carries
//! an empty signature field, a widget annotation, and a signature dictionary
//! with a fixed-capacity `/Contents` placeholder. It hashes the `/ByteRange`
//! regions, builds a CAdES-BES `SignedData` over the hash, obtains an
//! [RFC 3161] signature time stamp from a TSA, and splices the final CMS
//! into the placeholder without moving a single byte of the document.
//!
//! When the signing certificate does not permit signing (key usage without
//! `digitalSignature`/`contentCommitment`, or an EKU that only allows time
//! stamping), the crate falls back to a bare document time stamp
//! (`/SubFilter /ETSI.RFC3161`).
//!
//! The main entry points are [`sign::sign_pades_t`] and
//! [`sign::add_document_timestamp`].
//!
//! [RFC 3161]: https://www.ietf.org/rfc/rfc3161.txt

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

pub mod asn1;
pub mod cms;

mod error;
pub use error::{Error, Result};

pub mod oids;
pub use oids::DigestAlgorithm;

pub mod pdf;

pub mod raw_signature;
pub use raw_signature::{RawSigner, RawSignerError, SigningAlg};

pub mod sign;
pub use sign::{SignMode, SignOutcome, SignRequest, TsaOptions};

pub mod time_stamp;
pub use time_stamp::TimeStampError;

pub mod x509;

#[cfg(test)]
pub(crate) mod tests;
