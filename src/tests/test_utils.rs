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

//! Shared fixtures: a minimal one-page PDF, synthetic DER certificates,
//! runtime-generated keys, and an in-process mock TSA.

use std::{
    io::{Read, Write},
    net::TcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use bcder::{
    decode::Constructed,
    encode::{self, PrimitiveContent, Values},
    Integer, Mode, OctetString, Oid,
};
use bytes::Bytes;

use crate::{
    asn1::{
        rfc3161::{PkiFreeText, PkiStatus, PkiStatusInfo, TimeStampReq, TimeStampResp, TstInfo},
        to_der, wrap_der, AlgorithmIdentifier, GeneralizedTime, RawDer,
    },
    oids::{
        OID_CONTENT_TYPE_TST_INFO, OID_ID_SIGNED_DATA, OID_SHA256, OID_SHA256_WITH_RSA,
    },
};

/// A valid one-page PDF with no AcroForm, roughly one kilobyte.
pub(crate) fn minimal_pdf() -> Vec<u8> {
    pdf_with_objects(&[
        (1, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>",
        ),
    ])
}

/// Build a classical-xref PDF from consecutively numbered object bodies.
/// Object 1 must be the catalog.
pub(crate) fn pdf_with_objects(bodies: &[(u32, &str)]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = Vec::new();
    for (num, body) in bodies {
        offsets.push(out.len());
        out.extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let size = bodies.len() + 1;
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    out
}

/// Public key material for a synthetic certificate.
pub(crate) enum TestKey {
    /// PKCS#1 RSAPublicKey DER.
    Rsa(Vec<u8>),

    /// Named curve OID content bytes plus an uncompressed SEC1 point.
    Ec {
        curve: &'static [u8],
        point: Vec<u8>,
    },
}

/// Knobs for [`make_test_cert`].
pub(crate) struct TestCertOptions {
    pub cn: &'static str,
    pub key: TestKey,
    /// First KeyUsage bit byte (digitalSignature = 0x80, nonRepudiation =
    /// 0x40, keyAgreement = 0x08); `None` omits the extension.
    pub key_usage: Option<u8>,
    /// EKU OID content bytes; `None` omits the extension.
    pub eku: Option<Vec<&'static [u8]>>,
}

/// Build a syntactically valid v3 certificate DER around the given public
/// key. The outer signature is garbage; nothing in this crate verifies it.
pub(crate) fn make_test_cert(opts: &TestCertOptions) -> Vec<u8> {
    let version = wrap_der(0xa0, &wrap_der(0x02, &[2]));
    let serial = wrap_der(0x02, &[0x0d, 0xf0, 0x0d]);
    let sig_alg = der(encode::sequence((
        Oid(OID_SHA256_WITH_RSA.0).encode(),
        ().encode(),
    )));
    let issuer = name("Test Issuing CA");
    let validity = {
        let not_before = wrap_der(0x17, b"200101000000Z");
        let not_after = wrap_der(0x17, b"400101000000Z");
        wrap_der(0x30, &[not_before, not_after].concat())
    };
    let subject = name(opts.cn);

    let spki = match &opts.key {
        TestKey::Rsa(pkcs1) => {
            let alg = der(encode::sequence((
                Oid(crate::oids::OID_RSA_ENCRYPTION.0).encode(),
                ().encode(),
            )));
            let bits = bit_string(pkcs1);
            wrap_der(0x30, &[alg, bits].concat())
        }
        TestKey::Ec { curve, point } => {
            let alg = der(encode::sequence((
                Oid(crate::oids::OID_EC_PUBLIC_KEY.0).encode(),
                Oid(*curve).encode(),
            )));
            let bits = bit_string(point);
            wrap_der(0x30, &[alg, bits].concat())
        }
    };

    let mut extensions = Vec::new();
    if let Some(bits) = opts.key_usage {
        let unused = if bits == 0 { 0 } else { bits.trailing_zeros() as u8 };
        let value = wrap_der(0x03, &[unused, bits]);
        extensions.extend(extension(&[85, 29, 15], &value));
    }
    if let Some(ekus) = &opts.eku {
        let oids: Vec<u8> = ekus.iter().flat_map(|e| wrap_der(0x06, e)).collect();
        let value = wrap_der(0x30, &oids);
        extensions.extend(extension(&[85, 29, 37], &value));
    }

    let mut tbs_content = Vec::new();
    tbs_content.extend(version);
    tbs_content.extend(serial);
    tbs_content.extend(sig_alg.clone());
    tbs_content.extend(issuer);
    tbs_content.extend(validity);
    tbs_content.extend(subject);
    tbs_content.extend(spki);
    if !extensions.is_empty() {
        let ext_seq = wrap_der(0x30, &extensions);
        tbs_content.extend(wrap_der(0xa3, &ext_seq));
    }
    let tbs = wrap_der(0x30, &tbs_content);

    let signature = bit_string(&[0xde, 0xad, 0xbe, 0xef]);
    wrap_der(0x30, &[tbs, sig_alg, signature].concat())
}

/// The issuer Name DER used by [`make_test_cert`], for assertions.
pub(crate) fn test_issuer_name() -> Vec<u8> {
    name("Test Issuing CA")
}

fn name(cn: &str) -> Vec<u8> {
    let atv = wrap_der(
        0x30,
        &[wrap_der(0x06, &[85, 4, 3]), wrap_der(0x13, cn.as_bytes())].concat(),
    );
    wrap_der(0x30, &wrap_der(0x31, &atv))
}

fn extension(oid: &[u8], value_der: &[u8]) -> Vec<u8> {
    wrap_der(
        0x30,
        &[wrap_der(0x06, oid), wrap_der(0x04, value_der)].concat(),
    )
}

fn bit_string(data: &[u8]) -> Vec<u8> {
    let mut content = vec![0u8];
    content.extend_from_slice(data);
    wrap_der(0x03, &content)
}

pub(crate) fn der(values: impl Values) -> Vec<u8> {
    to_der(values).expect("DER encoding failed")
}

pub(crate) fn pem_block(tag: &str, der: &[u8]) -> Vec<u8> {
    pem::encode(&pem::Pem::new(tag, der)).into_bytes()
}

/// What the mock TSA does with a granted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TsaBehavior {
    /// Echo imprint and nonce, status 0.
    Echo,

    /// Status 2 (rejection), no token.
    Reject,

    /// Echo, but flip a byte of the imprint.
    TamperImprint,

    /// Echo without reflecting the nonce.
    OmitNonce,
}

/// An in-process RFC 3161 responder on a loopback port.
pub(crate) struct MockTsa {
    url: String,
    requests: Arc<AtomicUsize>,
}

impl MockTsa {
    pub(crate) fn spawn(behavior: TsaBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock TSA");
        let addr = listener.local_addr().expect("mock TSA addr");
        let requests = Arc::new(AtomicUsize::new(0));
        let seen = requests.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                if let Some(body) = read_http_request(&mut stream) {
                    seen.fetch_add(1, Ordering::SeqCst);
                    let response = respond(&body, behavior);
                    let _ = stream.write_all(
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/timestamp-reply\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            response.len()
                        )
                        .as_bytes(),
                    );
                    let _ = stream.write_all(&response);
                }
            }
        });

        Self {
            url: format!("http://{addr}"),
            requests,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn read_http_request(stream: &mut std::net::TcpStream) -> Option<Vec<u8>> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).ok()?;
        head.push(byte[0]);
        if head.len() > 16384 {
            return None;
        }
    }

    let head_text = String::from_utf8_lossy(&head);
    let content_length: usize = head_text
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    let mut body = vec![0u8; content_length];
    stream.read_exact(&mut body).ok()?;
    Some(body)
}

fn respond(request_der: &[u8], behavior: TsaBehavior) -> Vec<u8> {
    let request = Constructed::decode(request_der, Mode::Der, TimeStampReq::take_from)
        .expect("mock TSA: undecodable request");

    if behavior == TsaBehavior::Reject {
        let resp = TimeStampResp {
            status: PkiStatusInfo {
                status: PkiStatus::Rejection,
                status_string: Some(PkiFreeText::new(vec!["rejection".to_string()])),
                fail_info: None,
            },
            time_stamp_token: None,
        };
        return der(resp.encode_ref());
    }

    let mut imprint = request.message_imprint.clone();
    if behavior == TsaBehavior::TamperImprint {
        let mut bytes = imprint.hashed_message.to_bytes().to_vec();
        bytes[0] ^= 0xff;
        imprint.hashed_message = OctetString::new(Bytes::from(bytes));
    }

    let tst_info = TstInfo {
        version: Integer::from(1_u8),
        policy: Oid(Bytes::from_static(&[42, 3, 4])),
        message_imprint: imprint,
        serial_number: Integer::from(7_u8),
        gen_time: GeneralizedTime::from_datetime(&chrono::Utc::now()),
        accuracy: None,
        ordering: None,
        nonce: if behavior == TsaBehavior::OmitNonce {
            None
        } else {
            request.nonce.clone()
        },
        tsa: None,
    };
    let tst_der = der(tst_info.encode_ref());

    // SignedData with the TSTInfo as eContent and a throwaway signer.
    let digest_alg = AlgorithmIdentifier::new(Oid(Bytes::from_static(OID_SHA256.0)));
    let sig_alg = AlgorithmIdentifier::new_with_null(Oid(Bytes::from_static(OID_SHA256_WITH_RSA.0)));
    let empty_name = wrap_der(0x30, &[]);
    let signer_info = der(encode::sequence((
        1u8.encode(),
        encode::sequence((RawDer(&empty_name), 1u8.encode())),
        &digest_alg,
        &sig_alg,
        OctetString::encode_slice(&[0u8; 4][..]),
    )));

    let signed_data = der(encode::sequence((
        3u8.encode(),
        encode::set(&digest_alg),
        encode::sequence((
            Oid(Bytes::from_static(OID_CONTENT_TYPE_TST_INFO.0)).encode(),
            encode::sequence_as(bcder::Tag::CTX_0, OctetString::encode_slice(&tst_der[..])),
        )),
        encode::set(RawDer(&signer_info)),
    )));

    let resp = der(encode::sequence((
        PkiStatusInfo::new(PkiStatus::Granted).encode_ref(),
        encode::sequence((
            Oid(Bytes::from_static(OID_ID_SIGNED_DATA.0)).encode(),
            encode::sequence_as(bcder::Tag::CTX_0, RawDer(&signed_data)),
        )),
    )));

    resp
}
