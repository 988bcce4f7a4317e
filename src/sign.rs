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

//! The PAdES orchestrator: drives the sign, document-timestamp, and
//! fallback flows across the PDF writer, the CMS builder, and the TSA
//! client.

use std::time::Duration;

use log::{debug, info};
use x509_parser::pem::Pem;

use crate::{
    cms::CadesSignatureBuilder,
    oids::{oid_from_dotted, DigestAlgorithm},
    pdf::{
        appearance::embed_appearance,
        writer::{
            compute_byte_range_hash, ensure_acro_form_and_empty_sig_field, inject_cms,
            prepare_placeholder,
        },
        Document, PlaceholderOptions, SubFilter,
    },
    raw_signature::{signer_from_key_pem, SigningAlg},
    time_stamp::{TimeStampRequest, TsaClient},
    x509::SignerCertificate,
    Error, Result,
};

const DEFAULT_FIELD_NAME: &str = "Sig1";
const DEFAULT_DOC_TS_FIELD_NAME: &str = "DocTS";

/// Default `/Contents` hex capacity for a PAdES-T signature.
pub const DEFAULT_SIGNATURE_HEX_LEN: usize = 120_000;

/// Default `/Contents` hex capacity for a document time stamp.
pub const DEFAULT_DOC_TS_HEX_LEN: usize = 64_000;

/// Options for the TSA round trip.
#[derive(Clone, Debug)]
pub struct TsaOptions {
    /// The TSA endpoint.
    pub url: String,

    /// Extra request headers (e.g. `Authorization`), forwarded verbatim.
    pub headers: Vec<(String, String)>,

    /// Digest for the TSA message imprint; defaults to the signing digest.
    pub digest: Option<DigestAlgorithm>,

    /// Ask the TSA to embed its certificate (default true).
    pub cert_req: bool,

    /// Request a specific TSA policy, dotted-decimal.
    pub policy: Option<String>,

    /// Nonce width in bytes (default 8).
    pub nonce_bytes: usize,

    /// Accept responses that omit the nonce (default true).
    pub allow_missing_nonce: bool,

    /// Abort the round trip after this long.
    pub timeout: Duration,
}

impl TsaOptions {
    /// Defaults for the service at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            digest: None,
            cert_req: true,
            policy: None,
            nonce_bytes: 8,
            allow_missing_nonce: true,
            timeout: Duration::from_secs(30),
        }
    }

    fn client(&self) -> TsaClient {
        TsaClient::new(self.url.clone())
            .with_headers(self.headers.clone())
            .with_timeout(self.timeout)
            .with_allow_missing_nonce(self.allow_missing_nonce)
    }

    fn request(&self, imprint: Vec<u8>, digest: DigestAlgorithm) -> Result<TimeStampRequest> {
        let mut request = TimeStampRequest::new(imprint, digest)
            .map_err(Error::TimeStamp)?
            .with_cert_req(self.cert_req)
            .with_nonce_bytes(self.nonce_bytes)
            .map_err(Error::TimeStamp)?;
        if let Some(policy) = &self.policy {
            request = request.with_policy(oid_from_dotted(policy)?);
        }
        Ok(request)
    }
}

/// Appending a document time stamp after (or instead of) the signature.
#[derive(Clone, Debug, Default)]
pub struct DocumentTimestampOptions {
    /// Append a DocTimeStamp update after the PAdES-T signature.
    pub append: bool,

    /// Field name for the timestamp signature (default `DocTS`).
    pub field_name: Option<String>,

    /// `/Contents` capacity for the timestamp (default 64000 hex digits).
    pub placeholder_hex_len: Option<usize>,
}

/// A visible signature widget with a PNG stamp.
#[derive(Clone, Debug)]
pub struct VisibleSignature {
    /// Widget rectangle `[x0 y0 x1 y1]` in PDF user space.
    pub rect: [f64; 4],

    /// Zero-based index of the page carrying the widget.
    pub page_index: usize,

    /// The stamp image as a PNG buffer.
    pub stamp_png: Vec<u8>,

    /// Signing reason, drawn on the stamp and recorded in the signature
    /// dictionary.
    pub reason: Option<String>,

    /// Signer name override for the stamp and `/Name`.
    pub signer_name: Option<String>,
}

/// Everything needed for one signing operation.
pub struct SignRequest {
    /// The input PDF.
    pub pdf: Vec<u8>,

    /// The signer's certificate, PEM-encoded.
    pub cert_pem: Vec<u8>,

    /// The signer's private key, PEM-encoded.
    pub key_pem: Vec<u8>,

    /// Intermediate certificates, PEM-encoded, issuer-first.
    pub chain_pem: Option<Vec<u8>>,

    /// Signature field name (default `Sig1`; a leading `/` is stripped).
    pub field_name: Option<String>,

    /// `/Contents` capacity in hex digits (default 120000).
    pub placeholder_hex_len: Option<usize>,

    /// TSA configuration.
    pub tsa: TsaOptions,

    /// Optional document timestamp appended after the signature.
    pub document_timestamp: Option<DocumentTimestampOptions>,

    /// Optional visible appearance.
    pub visible: Option<VisibleSignature>,
}

/// How the output PDF was produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignMode {
    /// A PAdES-T signature.
    PadesT,

    /// A PAdES-T signature followed by a document time stamp.
    PadesTWithDocTs,

    /// The certificate cannot sign; a bare document time stamp was
    /// produced instead.
    DocTsFallback,

    /// A document time stamp requested directly.
    DocTs,
}

impl SignMode {
    /// The wire name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PadesT => "pades-t",
            Self::PadesTWithDocTs => "pades-t+docts",
            Self::DocTsFallback => "docts-fallback",
            Self::DocTs => "docts",
        }
    }
}

impl std::fmt::Display for SignMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a signing operation.
#[derive(Debug)]
pub struct SignOutcome {
    /// The updated PDF.
    pub pdf: Vec<u8>,

    /// How the PDF was signed.
    pub mode: SignMode,
}

/// Produce a PAdES-T signature over `request.pdf`.
///
/// When the signing certificate does not permit signing, the operation
/// silently degrades to a document time stamp and reports
/// [`SignMode::DocTsFallback`]. On error the input buffer is dropped
/// without any partially written file becoming observable.
pub fn sign_pades_t(request: SignRequest) -> Result<SignOutcome> {
    let field_name = normalize_field_name(request.field_name.as_deref(), DEFAULT_FIELD_NAME);
    let capacity = request
        .placeholder_hex_len
        .unwrap_or(DEFAULT_SIGNATURE_HEX_LEN);

    let leaf_der = first_pem_block(&request.cert_pem)?;
    let cert = SignerCertificate::parse(&leaf_der)?;

    if !cert.can_sign() {
        info!("certificate cannot sign; falling back to a document time stamp");
        let pdf = add_document_timestamp_inner(
            request.pdf,
            &field_name,
            request
                .placeholder_hex_len
                .unwrap_or(DEFAULT_DOC_TS_HEX_LEN),
            &request.tsa,
        )?;
        return Ok(SignOutcome {
            pdf,
            mode: SignMode::DocTsFallback,
        });
    }

    let chain_der = match &request.chain_pem {
        Some(pem) => all_pem_blocks(pem)?,
        None => Vec::new(),
    };

    let digest = cert.recommended_digest()?;
    let alg = SigningAlg::from_key_and_digest(cert.public_key_kind(), digest)?;
    let signer = signer_from_key_pem(&request.key_pem, alg)?;

    // Ensure the form and field, then (optionally) the visible appearance,
    // then the placeholder. Each step appends one incremental update, so
    // everything but the placeholder hex lies inside the signed region.
    let doc = Document::open(request.pdf)?;
    let rect = request.visible.as_ref().map(|v| v.rect);
    let page_index = request.visible.as_ref().map(|v| v.page_index).unwrap_or(0);
    let (pdf, ensured) = ensure_acro_form_and_empty_sig_field(&doc, &field_name, rect, page_index)?;

    let pdf = match &request.visible {
        Some(visible) => {
            let doc = Document::open(pdf)?;
            let mut lines = Vec::new();
            let name = visible
                .signer_name
                .clone()
                .unwrap_or_else(|| cert.subject_common_name().to_string());
            if !name.is_empty() {
                lines.push(name);
            }
            if let Some(reason) = &visible.reason {
                lines.push(reason.clone());
            }
            embed_appearance(&doc, &ensured, &visible.stamp_png, &lines)?
        }
        None => pdf,
    };

    let doc = Document::open(pdf)?;
    let opts = PlaceholderOptions {
        sub_filter: SubFilter::EtsiCadesDetached,
        placeholder_hex_len: capacity,
        field_name: Some(field_name),
        signer_name: Some(
            request
                .visible
                .as_ref()
                .and_then(|v| v.signer_name.clone())
                .unwrap_or_else(|| cert.subject_common_name().to_string()),
        ),
        reason: request.visible.as_ref().and_then(|v| v.reason.clone()),
    };
    let (mut pdf, placeholder) = prepare_placeholder(&doc, &opts)?;

    // Strictly serial from here: hash, sign, time stamp, inject.
    let byte_range_hash = compute_byte_range_hash(&pdf, &placeholder, digest);
    debug!("byte range hash computed over {:?}", placeholder.byte_range);

    let builder = CadesSignatureBuilder::new(&cert, chain_der, digest, alg, &byte_range_hash)?;
    let signature = signer.sign(&builder.to_be_signed())?;

    let ts_digest = request.tsa.digest.unwrap_or(digest);
    let ts_request = request.tsa.request(ts_digest.digest(&signature), ts_digest)?;
    let token = request.tsa.client().request_token(&ts_request)?;

    let cms = builder.build(&signature, Some(&token))?;
    inject_cms(&mut pdf, placeholder, &cms)?;

    match request.document_timestamp {
        Some(doc_ts) if doc_ts.append => {
            let pdf = add_document_timestamp_inner(
                pdf,
                &normalize_field_name(doc_ts.field_name.as_deref(), DEFAULT_DOC_TS_FIELD_NAME),
                doc_ts.placeholder_hex_len.unwrap_or(DEFAULT_DOC_TS_HEX_LEN),
                &request.tsa,
            )?;
            Ok(SignOutcome {
                pdf,
                mode: SignMode::PadesTWithDocTs,
            })
        }
        _ => Ok(SignOutcome {
            pdf,
            mode: SignMode::PadesT,
        }),
    }
}

/// Append a bare document time stamp (`/SubFilter /ETSI.RFC3161`) to `pdf`.
pub fn add_document_timestamp(
    pdf: Vec<u8>,
    field_name: Option<&str>,
    placeholder_hex_len: Option<usize>,
    tsa: &TsaOptions,
) -> Result<SignOutcome> {
    let pdf = add_document_timestamp_inner(
        pdf,
        &normalize_field_name(field_name, DEFAULT_DOC_TS_FIELD_NAME),
        placeholder_hex_len.unwrap_or(DEFAULT_DOC_TS_HEX_LEN),
        tsa,
    )?;
    Ok(SignOutcome {
        pdf,
        mode: SignMode::DocTs,
    })
}

fn add_document_timestamp_inner(
    pdf: Vec<u8>,
    field_name: &str,
    placeholder_hex_len: usize,
    tsa: &TsaOptions,
) -> Result<Vec<u8>> {
    let doc = Document::open(pdf)?;
    let (pdf, _ensured) = ensure_acro_form_and_empty_sig_field(&doc, field_name, None, 0)?;

    let doc = Document::open(pdf)?;
    let opts = PlaceholderOptions {
        sub_filter: SubFilter::EtsiRfc3161,
        placeholder_hex_len,
        field_name: Some(field_name.to_string()),
        signer_name: None,
        reason: None,
    };
    let (mut pdf, placeholder) = prepare_placeholder(&doc, &opts)?;

    let ts_digest = tsa.digest.unwrap_or(DigestAlgorithm::Sha256);
    let imprint = compute_byte_range_hash(&pdf, &placeholder, ts_digest);
    let ts_request = tsa.request(imprint, ts_digest)?;
    let token = tsa.client().request_token(&ts_request)?;

    inject_cms(&mut pdf, placeholder, &token)?;
    Ok(pdf)
}

// Field names are PDF text strings; a leading `/` from name-style inputs
// is stripped.
fn normalize_field_name(name: Option<&str>, default: &str) -> String {
    match name {
        Some(name) => {
            let trimmed = name.trim_start_matches('/');
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => default.to_string(),
    }
}

fn first_pem_block(pem: &[u8]) -> Result<Vec<u8>> {
    Pem::iter_from_buffer(pem)
        .next()
        .transpose()
        .map_err(|e| Error::CertInvalid(e.to_string()))?
        .map(|p| p.contents)
        .ok_or_else(|| Error::CertInvalid("no PEM block found".to_string()))
}

fn all_pem_blocks(pem: &[u8]) -> Result<Vec<Vec<u8>>> {
    Pem::iter_from_buffer(pem)
        .map(|r| r.map(|p| p.contents))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::CertInvalid(e.to_string()))
}
