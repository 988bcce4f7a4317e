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

//! End-to-end signing scenarios against the in-process mock TSA.

use bcder::{decode::Constructed, Mode};
use rsa::pkcs1::EncodeRsaPublicKey;

use crate::{
    asn1::{
        der_value_len,
        rfc3161::TstInfo,
        rfc5652::{ContentInfo, SignedData},
    },
    oids::{DigestAlgorithm, OID_MESSAGE_DIGEST, OID_SIGNATURE_TIME_STAMP},
    pdf::object::{dict_get, find_from},
    sign::{
        add_document_timestamp, sign_pades_t, DocumentTimestampOptions, SignMode, SignRequest,
        TsaOptions,
    },
    tests::test_utils::{
        make_test_cert, minimal_pdf, pem_block, MockTsa, TestCertOptions, TestKey, TsaBehavior,
    },
    time_stamp::TimeStampError,
    Error,
};

struct Identity {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

fn rsa_identity(key_usage: Option<u8>) -> Identity {
    use rsa::pkcs8::EncodePrivateKey;

    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let pkcs1 = key.to_public_key().to_pkcs1_der().unwrap().into_vec();
    let der = make_test_cert(&TestCertOptions {
        cn: "End To End",
        key: TestKey::Rsa(pkcs1),
        key_usage,
        eku: None,
    });

    Identity {
        cert_pem: pem_block("CERTIFICATE", &der),
        key_pem: key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap()
            .as_bytes()
            .to_vec(),
    }
}

fn p384_identity() -> Identity {
    use pkcs8::EncodePrivateKey;

    let key = p384::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
    let point = key
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    let der = make_test_cert(&TestCertOptions {
        cn: "P384 Signer",
        key: TestKey::Ec {
            curve: crate::oids::OID_SECP384R1.0,
            point,
        },
        key_usage: Some(0x80),
        eku: None,
    });

    Identity {
        cert_pem: pem_block("CERTIFICATE", &der),
        key_pem: key
            .to_pkcs8_pem(pkcs8::LineEnding::LF)
            .unwrap()
            .as_bytes()
            .to_vec(),
    }
}

fn request(identity: &Identity, tsa: &MockTsa) -> SignRequest {
    SignRequest {
        pdf: minimal_pdf(),
        cert_pem: identity.cert_pem.clone(),
        key_pem: identity.key_pem.clone(),
        chain_pem: None,
        field_name: None,
        placeholder_hex_len: None,
        tsa: TsaOptions::new(tsa.url()),
        document_timestamp: None,
        visible: None,
    }
}

// Extract the hex interior of the LAST /Contents in the file, decoded to
// bytes with the zero padding trimmed to the embedded DER length.
fn last_contents_der(pdf: &[u8]) -> Vec<u8> {
    let key = crate::pdf::object::find_last(pdf, b"/Contents").unwrap();
    let open = find_from(pdf, b"<", key).unwrap();
    let close = find_from(pdf, b">", open).unwrap();
    let raw = hex::decode(&pdf[open + 1..close]).unwrap();
    let len = der_value_len(&raw).unwrap();
    raw[..len].to_vec()
}

fn parse_byte_range(pdf: &[u8], from: usize) -> [u64; 4] {
    let br = find_from(pdf, b"/ByteRange [", from).unwrap() + b"/ByteRange [".len();
    let text = std::str::from_utf8(&pdf[br..br + 43]).unwrap();
    let parts: Vec<u64> = text.split(' ').map(|p| p.parse().unwrap()).collect();
    [parts[0], parts[1], parts[2], parts[3]]
}

fn byte_range_digest(pdf: &[u8], range: [u64; 4], algo: DigestAlgorithm) -> Vec<u8> {
    let mut hasher = algo.hasher();
    hasher.update(&pdf[range[0] as usize..(range[0] + range[1]) as usize]);
    hasher.update(&pdf[range[2] as usize..(range[2] + range[3]) as usize]);
    hasher.finish()
}

fn signed_data_of(cms_der: &[u8]) -> SignedData {
    let ci = Constructed::decode(cms_der, Mode::Der, ContentInfo::take_from).unwrap();
    ci.content.unwrap().decode(SignedData::take_from).unwrap()
}

fn tst_info_of(token_der: &[u8]) -> TstInfo {
    let sd = signed_data_of(token_der);
    let content = sd.content_info.content.unwrap();
    Constructed::decode(content.to_bytes(), Mode::Ber, TstInfo::take_from).unwrap()
}

#[test]
fn pades_t_end_to_end() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let identity = rsa_identity(Some(0x80));

    let outcome = sign_pades_t(request(&identity, &tsa)).unwrap();
    assert_eq!(outcome.mode, SignMode::PadesT);
    assert_eq!(outcome.mode.as_str(), "pades-t");
    assert_eq!(tsa.request_count(), 1);

    let pdf = &outcome.pdf;
    assert!(find_from(pdf, b"/SigFlags 3", 0).is_some());
    assert!(find_from(pdf, b"/SubFilter /ETSI.CAdES.detached", 0).is_some());
    assert!(find_from(pdf, b"(Sig1)", 0).is_some());

    // The field gained /V.
    let doc = crate::pdf::Document::open(pdf.clone()).unwrap();
    let (_, fields) = doc.acro_form_fields().unwrap().unwrap();
    assert_eq!(fields.len(), 1);
    let field_dict = doc.dict(fields[0]).unwrap();
    assert!(dict_get(field_dict, "V").is_some());

    // ByteRange covers the whole file minus the hex interior.
    let range = parse_byte_range(pdf, 0);
    assert_eq!(range[0], 0);
    assert_eq!(range[2] + range[3], pdf.len() as u64);

    // The CMS carries one signer with the message digest of the byte
    // range and an unsigned signature time stamp over the signature.
    let cms = last_contents_der(pdf);
    let sd = signed_data_of(&cms);
    assert_eq!(sd.signer_infos.len(), 1);
    let si = &sd.signer_infos[0];

    let md_attr = si.signed_attribute(OID_MESSAGE_DIGEST).unwrap();
    let expected = byte_range_digest(pdf, range, DigestAlgorithm::Sha256);
    assert_eq!(
        crate::asn1::der_content(&md_attr.values[0]).unwrap(),
        expected
    );

    let ts_attr = si.unsigned_attribute(OID_SIGNATURE_TIME_STAMP).unwrap();
    let tst = tst_info_of(&ts_attr.values[0]);
    assert!(tst.nonce.is_some(), "mock echoes the client nonce");
    assert_eq!(
        tst.message_imprint.hashed_message.to_bytes().as_ref(),
        DigestAlgorithm::Sha256.digest(&si.signature.to_bytes())
    );
}

#[test]
fn key_usage_gating_falls_back_to_doc_ts() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    // keyAgreement only: cannot sign.
    let identity = rsa_identity(Some(0x08));

    let outcome = sign_pades_t(request(&identity, &tsa)).unwrap();
    assert_eq!(outcome.mode, SignMode::DocTsFallback);
    assert_eq!(outcome.mode.as_str(), "docts-fallback");

    let pdf = &outcome.pdf;
    assert!(find_from(pdf, b"/SubFilter /ETSI.RFC3161", 0).is_some());
    assert!(find_from(pdf, b"/SubFilter /ETSI.CAdES.detached", 0).is_none());
    assert!(find_from(pdf, b"/DocTimeStamp", 0).is_some());

    // The bare token's imprint is the SHA-256 of the byte ranges.
    let range = parse_byte_range(pdf, 0);
    let tst = tst_info_of(&last_contents_der(pdf));
    assert_eq!(
        tst.message_imprint.hashed_message.to_bytes().as_ref(),
        byte_range_digest(pdf, range, DigestAlgorithm::Sha256)
    );
}

#[test]
fn eku_gating_falls_back_to_doc_ts() {
    use rsa::pkcs8::EncodePrivateKey;

    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let pkcs1 = key.to_public_key().to_pkcs1_der().unwrap().into_vec();
    let der = make_test_cert(&TestCertOptions {
        cn: "TSA Cert",
        key: TestKey::Rsa(pkcs1),
        key_usage: Some(0x80),
        eku: Some(vec![crate::oids::OID_KP_TIME_STAMPING.0]),
    });
    let identity = Identity {
        cert_pem: pem_block("CERTIFICATE", &der),
        key_pem: key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap()
            .as_bytes()
            .to_vec(),
    };

    let outcome = sign_pades_t(request(&identity, &tsa)).unwrap();
    assert_eq!(outcome.mode, SignMode::DocTsFallback);
}

#[test]
fn appended_doc_ts_chains_after_the_signature() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let identity = rsa_identity(Some(0x80));

    let mut req = request(&identity, &tsa);
    req.document_timestamp = Some(DocumentTimestampOptions {
        append: true,
        field_name: Some("DocTS".to_string()),
        placeholder_hex_len: None,
    });

    let outcome = sign_pades_t(req).unwrap();
    assert_eq!(outcome.mode, SignMode::PadesTWithDocTs);
    assert_eq!(outcome.mode.as_str(), "pades-t+docts");
    assert_eq!(tsa.request_count(), 2);

    let pdf = &outcome.pdf;
    assert!(find_from(pdf, b"(Sig1)", 0).is_some());
    assert!(find_from(pdf, b"(DocTS)", 0).is_some());
    assert!(find_from(pdf, b"/SubFilter /ETSI.CAdES.detached", 0).is_some());
    assert!(find_from(pdf, b"/SubFilter /ETSI.RFC3161", 0).is_some());

    // Two signature fields, both filled.
    let doc = crate::pdf::Document::open(pdf.clone()).unwrap();
    let (_, fields) = doc.acro_form_fields().unwrap().unwrap();
    assert_eq!(fields.len(), 2);
    for field in fields {
        assert!(dict_get(doc.dict(field).unwrap(), "V").is_some());
    }

    // Trailers chain newest → signature update → original.
    let newest_prev = doc.trailer().prev.unwrap();
    assert!(newest_prev > 0);
    let original = crate::pdf::Document::open(minimal_pdf()).unwrap();
    assert!(newest_prev > original.trailer().startxref);
}

#[test]
fn p384_selects_matching_algorithms() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let identity = p384_identity();

    let outcome = sign_pades_t(request(&identity, &tsa)).unwrap();
    assert_eq!(outcome.mode, SignMode::PadesT);

    let cms = last_contents_der(&outcome.pdf);
    let sd = signed_data_of(&cms);
    assert_eq!(
        sd.digest_algorithms[0].algorithm,
        crate::oids::OID_SHA384
    );

    let si = &sd.signer_infos[0];
    assert_eq!(
        si.digest_algorithm.algorithm,
        crate::oids::OID_SHA384
    );
    assert_eq!(
        si.signature_algorithm.algorithm,
        crate::oids::OID_ECDSA_WITH_SHA384
    );

    // ESSCertIDv2 names sha384 explicitly.
    let scv2_attr = si
        .signed_attribute(crate::oids::OID_SIGNING_CERTIFICATE_V2)
        .unwrap();
    let scv2 = Constructed::decode(
        scv2_attr.values[0].as_slice(),
        Mode::Der,
        crate::asn1::rfc5652::SigningCertificateV2::take_from,
    )
    .unwrap();
    assert_eq!(
        scv2.certs[0].hash_algorithm.as_ref().unwrap().algorithm,
        crate::oids::OID_SHA384
    );

    // The TSA imprint was built with sha384 as well.
    let ts_attr = si.unsigned_attribute(OID_SIGNATURE_TIME_STAMP).unwrap();
    let tst = tst_info_of(&ts_attr.values[0]);
    assert_eq!(tst.message_imprint.hashed_message.to_bytes().len(), 48);
}

#[test]
fn tsa_rejection_fails_the_operation() {
    let tsa = MockTsa::spawn(TsaBehavior::Reject);
    let identity = rsa_identity(Some(0x80));

    let err = sign_pades_t(request(&identity, &tsa)).unwrap_err();
    match err {
        Error::TimeStamp(TimeStampError::Rejected { status, .. }) => assert_eq!(status, 2),
        other => panic!("expected TSA rejection, got {other:?}"),
    }
}

#[test]
fn undersized_placeholder_fails_before_any_output() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let identity = rsa_identity(Some(0x80));

    let mut req = request(&identity, &tsa);
    req.placeholder_hex_len = Some(100);

    let err = sign_pades_t(req).unwrap_err();
    assert!(matches!(err, Error::PlaceholderTooSmall { .. }));
}

#[test]
fn direct_document_timestamp() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);

    let outcome =
        add_document_timestamp(minimal_pdf(), None, None, &TsaOptions::new(tsa.url())).unwrap();
    assert_eq!(outcome.mode, SignMode::DocTs);
    assert_eq!(outcome.mode.as_str(), "docts");

    let pdf = &outcome.pdf;
    assert!(find_from(pdf, b"(DocTS)", 0).is_some());
    assert!(find_from(pdf, b"/SubFilter /ETSI.RFC3161", 0).is_some());

    let range = parse_byte_range(pdf, 0);
    let tst = tst_info_of(&last_contents_der(pdf));
    assert_eq!(
        tst.message_imprint.hashed_message.to_bytes().as_ref(),
        byte_range_digest(pdf, range, DigestAlgorithm::Sha256)
    );
}

#[test]
fn visible_signature_embeds_an_appearance() {
    let tsa = MockTsa::spawn(TsaBehavior::Echo);
    let identity = rsa_identity(Some(0x80));

    let mut req = request(&identity, &tsa);
    req.visible = Some(crate::sign::VisibleSignature {
        rect: [100.0, 100.0, 300.0, 160.0],
        page_index: 0,
        stamp_png: tiny_png(),
        reason: Some("Approval".to_string()),
        signer_name: Some("End To End".to_string()),
    });

    let outcome = sign_pades_t(req).unwrap();
    assert_eq!(outcome.mode, SignMode::PadesT);

    let pdf = &outcome.pdf;
    assert!(find_from(pdf, b"/Subtype /Image", 0).is_some());
    assert!(find_from(pdf, b"/Subtype /Form", 0).is_some());
    assert!(find_from(pdf, b"/AS /N", 0).is_some());
    assert!(find_from(pdf, b"/Reason (Approval)", 0).is_some());

    // The appearance objects precede the placeholder, so they are inside
    // the signed region.
    let range = parse_byte_range(pdf, 0);
    let image = find_from(pdf, b"/Subtype /Image", 0).unwrap();
    assert!((image as u64) < range[1]);
}

// A 2x2 RGBA PNG built at test time.
fn tiny_png() -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 2, 2);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&[
                255, 0, 0, 255, 0, 255, 0, 128, //
                0, 0, 255, 255, 255, 255, 255, 0,
            ])
            .unwrap();
        writer.finish().unwrap();
    }
    out
}
