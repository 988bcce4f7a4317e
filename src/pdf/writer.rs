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

//! Appending incremental updates: AcroForm and signature-field synthesis,
//! signature placeholders, `/ByteRange` finalization, and CMS injection.
//!
//! Every operation takes a parsed [`Document`] and returns a new byte
//! buffer; nothing is mutated in place except the fixed-width `/ByteRange`
//! digits and the `/Contents` hex interior, both of which preserve every
//! byte offset in the file.

use std::collections::HashMap;

use chrono::Utc;
use log::debug;

use crate::{
    oids::DigestAlgorithm,
    pdf::{
        object::{
            array_items, as_literal_string, as_name, as_reference, dict_get, find_from, skip_ws,
            value_end,
        },
        reader::Document,
    },
    Error, Result,
};

// Widget flags: Print (4) | Locked (128).
const WIDGET_FLAGS: u32 = 132;

const BYTE_RANGE_PLACEHOLDER: &str = "0000000000 0000000000 0000000000 0000000000";

/// The `/SubFilter` of a signature dictionary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubFilter {
    /// A detached CAdES signature (PAdES).
    EtsiCadesDetached,

    /// A bare RFC 3161 token covering the document (DocTimeStamp).
    EtsiRfc3161,
}

impl SubFilter {
    /// The PDF name for this sub-filter.
    pub fn as_name(&self) -> &'static str {
        match self {
            Self::EtsiCadesDetached => "ETSI.CAdES.detached",
            Self::EtsiRfc3161 => "ETSI.RFC3161",
        }
    }
}

/// The signature field, widget, and page an update ensured.
#[derive(Clone, Debug)]
pub struct EnsuredField {
    /// Object number of the `/FT /Sig` field.
    pub field: u32,

    /// Object number of the widget annotation.
    pub widget: u32,

    /// Object number of the page carrying the widget.
    pub page: u32,

    /// The applied widget rectangle.
    pub rect: [f64; 4],
}

/// Options for [`prepare_placeholder`].
pub struct PlaceholderOptions {
    /// Which kind of signature the placeholder will hold.
    pub sub_filter: SubFilter,

    /// Reserved `/Contents` capacity in hex digits. Odd values are rounded
    /// up to the next even value.
    pub placeholder_hex_len: usize,

    /// Name of the field to sign; the first empty signature field is used
    /// when absent.
    pub field_name: Option<String>,

    /// Optional `/Name` entry for the signature dictionary.
    pub signer_name: Option<String>,

    /// Optional `/Reason` entry for the signature dictionary.
    pub reason: Option<String>,
}

/// The in-flight placeholder between preparation and CMS injection.
///
/// Offsets are absolute positions in the prepared buffer; injection
/// consumes the value.
#[derive(Debug)]
pub struct Placeholder {
    /// Offset of the `<` opening the `/Contents` hex string.
    pub contents_open: usize,

    /// Offset of the `>` closing the `/Contents` hex string.
    pub contents_close: usize,

    /// Hex capacity between the delimiters.
    pub capacity: usize,

    /// The finalized `[a b c d]` byte range.
    pub byte_range: [u64; 4],

    /// Object number of the signature dictionary.
    pub sig_object: u32,
}

/// Append an incremental update containing `objects` (object number →
/// body bytes) and a classical `xref` + `trailer`. Returns the new buffer
/// and the offset of each written object.
pub fn append_update(
    doc: &Document,
    objects: &[(u32, Vec<u8>)],
) -> (Vec<u8>, HashMap<u32, u64>) {
    let mut out = doc.bytes().to_vec();
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }

    let mut sorted: Vec<&(u32, Vec<u8>)> = objects.iter().collect();
    sorted.sort_by_key(|(num, _)| *num);

    let mut offsets = HashMap::new();
    for (num, body) in &sorted {
        offsets.insert(*num, out.len() as u64);
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n");

    // Contiguous runs become one subsection each.
    let mut i = 0;
    while i < sorted.len() {
        let start = sorted[i].0;
        let mut count = 1;
        while i + count < sorted.len() && sorted[i + count].0 == start + count as u32 {
            count += 1;
        }
        out.extend_from_slice(format!("{start} {count}\n").as_bytes());
        for (num, _) in &sorted[i..i + count] {
            let offset = offsets[num];
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        i += count;
    }

    let max_num = sorted.last().map(|(num, _)| *num).unwrap_or(0);
    let size = doc.trailer().size.max(max_num + 1);
    let root = doc.trailer().root;
    let prev = doc.trailer().startxref;

    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root {root} 0 R /Prev {prev} >>\nstartxref\n{xref_pos}\n%%EOF\n")
            .as_bytes(),
    );

    debug!(
        "appended update with {} object(s), {} bytes total",
        sorted.len(),
        out.len()
    );

    (out, offsets)
}

/// Ensure the document has an AcroForm with `/SigFlags 3` and an empty
/// signature field named `field_name`, creating field, widget, and page
/// annotation entries as needed in one incremental update.
///
/// An existing empty field with the requested name is reused as-is.
pub fn ensure_acro_form_and_empty_sig_field(
    doc: &Document,
    field_name: &str,
    rect: Option<[f64; 4]>,
    page_index: usize,
) -> Result<(Vec<u8>, EnsuredField)> {
    if let Some((field, field_dict)) = find_empty_sig_field(doc, Some(field_name))? {
        let widget = widget_of_field(doc, field, &field_dict)?;
        let widget_dict = doc.dict(widget)?;
        let page = dict_get(widget_dict, "P")
            .and_then(as_reference)
            .map(Ok)
            .unwrap_or_else(|| doc.first_page())?;
        let rect = dict_get(widget_dict, "Rect")
            .map(parse_rect)
            .unwrap_or([0.0; 4]);

        // The field is reusable as-is, but /SigFlags may still be missing
        // on a pre-existing AcroForm.
        let out = match doc.acro_form_fields()? {
            Some((Some(acro_obj), _)) => {
                let acro_dict = doc.dict(acro_obj)?.to_vec();
                if dict_get(&acro_dict, "SigFlags").is_none() {
                    let updated = replace_value(&acro_dict, "SigFlags", "3");
                    append_update(doc, &[(acro_obj, updated)]).0
                } else {
                    doc.bytes().to_vec()
                }
            }
            _ => doc.bytes().to_vec(),
        };

        return Ok((
            out,
            EnsuredField {
                field,
                widget,
                page,
                rect,
            },
        ));
    }

    let applied_rect = rect.unwrap_or([0.0; 4]);
    let page = doc.page_by_index(page_index)?;
    let page_dict = doc.dict(page)?.to_vec();

    let mut next = doc.next_object_number();
    let widget = alloc(&mut next);
    let field = alloc(&mut next);

    let mut objects: Vec<(u32, Vec<u8>)> = Vec::new();

    let widget_body = format!(
        "<< /Type /Annot /Subtype /Widget /Rect {} /F {WIDGET_FLAGS} /Parent {field} 0 R /P {page} 0 R >>",
        format_rect(applied_rect)
    );
    objects.push((widget, widget_body.into_bytes()));

    let field_body = format!(
        "<< /FT /Sig /T ({}) /Kids [{widget} 0 R] >>",
        escape_string(field_name)
    );
    objects.push((field, field_body.into_bytes()));

    // Widget lands in the page's /Annots exactly once.
    match dict_get(&page_dict, "Annots") {
        Some(value) => match as_reference(value) {
            Some(annots_obj) => {
                let array = array_object_of(doc, annots_obj)?;
                objects.push((annots_obj, push_array_item(&array, widget)));
            }
            None => {
                let new_array = push_array_item(value, widget);
                objects.push((
                    page,
                    replace_value(&page_dict, "Annots", &String::from_utf8_lossy(&new_array)),
                ));
            }
        },
        None => {
            objects.push((
                page,
                replace_value(&page_dict, "Annots", &format!("[{widget} 0 R]")),
            ));
        }
    }

    // AcroForm: append-missing, preserve existing entries.
    let root_dict = doc.dict(doc.trailer().root)?.to_vec();
    match dict_get(&root_dict, "AcroForm") {
        Some(value) => match as_reference(value) {
            Some(acro_obj) => {
                let acro_dict = doc.dict(acro_obj)?.to_vec();
                let updated = updated_acro_form(doc, &acro_dict, field, &mut objects)?;
                objects.push((acro_obj, updated));
            }
            None => {
                let updated = updated_acro_form(doc, value, field, &mut objects)?;
                objects.push((
                    doc.trailer().root,
                    replace_value(&root_dict, "AcroForm", &String::from_utf8_lossy(&updated)),
                ));
            }
        },
        None => {
            let acro_obj = alloc(&mut next);
            let acro_body = format!(
                "<< /Type /AcroForm /Fields [{field} 0 R] /SigFlags 3 >>"
            );
            objects.push((acro_obj, acro_body.into_bytes()));
            objects.push((
                doc.trailer().root,
                replace_value(&root_dict, "AcroForm", &format!("{acro_obj} 0 R")),
            ));
        }
    }

    let (out, _) = append_update(doc, &objects);
    Ok((
        out,
        EnsuredField {
            field,
            widget,
            page,
            rect: applied_rect,
        },
    ))
}

/// Prepare the signature placeholder: signature dictionary with zeroed
/// `/Contents` and `/ByteRange`, `/V` on the field, and (for DocTimeStamp)
/// a `/Perms` entry on the catalog, all in one incremental update whose
/// `/ByteRange` is finalized in place before returning.
pub fn prepare_placeholder(
    doc: &Document,
    opts: &PlaceholderOptions,
) -> Result<(Vec<u8>, Placeholder)> {
    let (field, field_dict) = find_empty_sig_field(doc, opts.field_name.as_deref())?
        .ok_or_else(|| {
            Error::FieldMissing(
                opts.field_name
                    .clone()
                    .unwrap_or_else(|| "<first empty>".to_string()),
            )
        })?;

    let widget = widget_of_field(doc, field, &field_dict)?;
    let widget_dict = doc.dict(widget)?;

    // Only reference the page when it really is one.
    let page = dict_get(widget_dict, "P").and_then(as_reference).filter(|p| {
        doc.dict(*p)
            .ok()
            .and_then(|d| dict_get(d, "Type"))
            .and_then(as_name)
            == Some(b"Page".as_ref())
    });

    let capacity = opts.placeholder_hex_len.max(2).next_multiple_of(2);

    let mut next = doc.next_object_number();
    let sig_object = alloc(&mut next);

    let mut sig_body = String::with_capacity(capacity + 256);
    sig_body.push_str("<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /");
    sig_body.push_str(opts.sub_filter.as_name());
    if let Some(page) = page {
        sig_body.push_str(&format!(" /P {page} 0 R"));
    }
    sig_body.push_str(&format!(" /ByteRange [{BYTE_RANGE_PLACEHOLDER}]"));
    sig_body.push_str(" /Contents <");
    sig_body.extend(std::iter::repeat('0').take(capacity));
    sig_body.push('>');
    sig_body.push_str(&Utc::now().format(" /M (D:%Y%m%d%H%M%SZ)").to_string());
    if let Some(name) = &opts.signer_name {
        sig_body.push_str(&format!(" /Name ({})", escape_string(name)));
    }
    if let Some(reason) = &opts.reason {
        sig_body.push_str(&format!(" /Reason ({})", escape_string(reason)));
    }
    sig_body.push_str(" >>");

    let mut objects: Vec<(u32, Vec<u8>)> = vec![
        (sig_object, sig_body.into_bytes()),
        (
            field,
            replace_value(&field_dict, "V", &format!("{sig_object} 0 R")),
        ),
    ];

    if opts.sub_filter == SubFilter::EtsiRfc3161 {
        let root = doc.trailer().root;
        let root_dict = doc.dict(root)?.to_vec();
        let perms_entry = format!("{sig_object} 0 R");
        match dict_get(&root_dict, "Perms") {
            Some(value) => match as_reference(value) {
                Some(perms_obj) => {
                    let perms_dict = doc.dict(perms_obj)?.to_vec();
                    objects.push((
                        perms_obj,
                        replace_value(&perms_dict, "DocTimeStamp", &perms_entry),
                    ));
                }
                None => {
                    let updated = replace_value(value, "DocTimeStamp", &perms_entry);
                    objects.push((
                        root,
                        replace_value(&root_dict, "Perms", &String::from_utf8_lossy(&updated)),
                    ));
                }
            },
            None => {
                objects.push((
                    root,
                    replace_value(
                        &root_dict,
                        "Perms",
                        &format!("<< /DocTimeStamp {perms_entry} >>"),
                    ),
                ));
            }
        }
    }

    let (mut out, offsets) = append_update(doc, &objects);

    // Locate the placeholder inside the freshly written signature object.
    let sig_offset = offsets[&sig_object] as usize;
    let contents_key = find_from(&out, b"/Contents", sig_offset)
        .ok_or_else(|| Error::PdfMalformed("placeholder /Contents not found".to_string()))?;
    let contents_open = find_from(&out, b"<", contents_key)
        .ok_or_else(|| Error::PdfMalformed("placeholder hex string not found".to_string()))?;
    let contents_close = contents_open + 1 + capacity;
    if out.get(contents_close) != Some(&b'>') {
        return Err(Error::PdfMalformed(
            "placeholder hex string is not intact".to_string(),
        ));
    }

    let br_key = find_from(&out, b"/ByteRange [", sig_offset)
        .ok_or_else(|| Error::PdfMalformed("placeholder /ByteRange not found".to_string()))?;
    let br_digits = br_key + b"/ByteRange [".len();

    let a = 0u64;
    let b = contents_open as u64;
    let c = (contents_close + 1) as u64;
    let d = out.len() as u64 - c;

    let patch = format!("{a:010} {b:010} {c:010} {d:010}");
    debug_assert_eq!(patch.len(), BYTE_RANGE_PLACEHOLDER.len());
    out[br_digits..br_digits + patch.len()].copy_from_slice(patch.as_bytes());

    Ok((
        out,
        Placeholder {
            contents_open,
            contents_close,
            capacity,
            byte_range: [a, b, c, d],
            sig_object,
        },
    ))
}

/// Hash the two byte ranges outside the placeholder with `algo`.
///
/// This is the exact pre-image the CMS `messageDigest` attribute commits
/// to; it is stable across repeated calls on the same buffer.
pub fn compute_byte_range_hash(
    pdf: &[u8],
    placeholder: &Placeholder,
    algo: DigestAlgorithm,
) -> Vec<u8> {
    let [a, b, c, d] = placeholder.byte_range;
    let mut hasher = algo.hasher();
    hasher.update(&pdf[a as usize..(a + b) as usize]);
    hasher.update(&pdf[c as usize..(c + d) as usize]);
    hasher.finish()
}

/// Splice the final CMS into the placeholder: uppercase hex, right-padded
/// with `0` to the reserved capacity. No byte offsets change.
///
/// The placeholder is consumed; the buffer keeps its `/ByteRange` valid.
pub fn inject_cms(pdf: &mut [u8], placeholder: Placeholder, cms_der: &[u8]) -> Result<()> {
    let hex = hex::encode_upper(cms_der);
    if hex.len() > placeholder.capacity {
        return Err(Error::PlaceholderTooSmall {
            needed: hex.len(),
            capacity: placeholder.capacity,
        });
    }

    let start = placeholder.contents_open + 1;
    pdf[start..start + hex.len()].copy_from_slice(hex.as_bytes());
    for b in &mut pdf[start + hex.len()..placeholder.contents_close] {
        *b = b'0';
    }
    Ok(())
}

// Locate an empty `/FT /Sig` field, by name when one is given.
fn find_empty_sig_field(
    doc: &Document,
    name: Option<&str>,
) -> Result<Option<(u32, Vec<u8>)>> {
    let Some((_, fields)) = doc.acro_form_fields()? else {
        return Ok(None);
    };

    for field in fields {
        let dict = doc.dict(field)?;
        if dict_get(dict, "FT").and_then(as_name) != Some(b"Sig".as_ref()) {
            continue;
        }
        if dict_get(dict, "V").is_some() {
            continue;
        }
        if let Some(wanted) = name {
            let matches = dict_get(dict, "T")
                .and_then(as_literal_string)
                .map(|t| t == wanted.as_bytes())
                .unwrap_or(false);
            if !matches {
                continue;
            }
        }
        return Ok(Some((field, dict.to_vec())));
    }

    Ok(None)
}

// The field's single widget: its first /Kids entry, or the field itself
// when field and widget are merged.
fn widget_of_field(doc: &Document, field: u32, field_dict: &[u8]) -> Result<u32> {
    if let Some(kids) = dict_get(field_dict, "Kids") {
        if let Some(widget) = array_items(kids).first().and_then(|k| as_reference(k)) {
            return Ok(widget);
        }
    }
    if dict_get(field_dict, "Subtype").and_then(as_name) == Some(b"Widget".as_ref()) {
        return Ok(field);
    }
    Err(Error::PdfMalformed(format!(
        "signature field {field} has no widget"
    )))
}

// The body of an indirect object holding a bare array.
fn array_object_of(doc: &Document, num: u32) -> Result<Vec<u8>> {
    let off = doc
        .xref()
        .get(num)
        .ok_or_else(|| Error::PdfMalformed(format!("array object {num} not found")))?
        as usize;
    let (_, _, body) = crate::pdf::object::object_header(doc.bytes(), off)
        .ok_or_else(|| Error::PdfMalformed(format!("array object {num} not found")))?;
    let start = skip_ws(doc.bytes(), body);
    let end = value_end(doc.bytes(), start)
        .ok_or_else(|| Error::PdfMalformed(format!("object {num} is not an array")))?;
    Ok(doc.bytes()[start..end].to_vec())
}

// Append `num 0 R` to an array value, keeping existing items.
fn push_array_item(array: &[u8], num: u32) -> Vec<u8> {
    let mut items: Vec<String> = array_items(array)
        .iter()
        .map(|i| String::from_utf8_lossy(i).into_owned())
        .collect();
    items.push(format!("{num} 0 R"));
    format!("[{}]", items.join(" ")).into_bytes()
}

// Set or replace `/key value` in a dictionary, preserving everything else.
pub(crate) fn replace_value(dict: &[u8], key: &str, value: &str) -> Vec<u8> {
    if let Some(old) = dict_get(dict, key) {
        let start = old.as_ptr() as usize - dict.as_ptr() as usize;
        let end = start + old.len();
        let mut out = Vec::with_capacity(dict.len() + value.len());
        out.extend_from_slice(&dict[..start]);
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(&dict[end..]);
        out
    } else {
        let insert_at = dict.len().saturating_sub(2);
        let mut out = Vec::with_capacity(dict.len() + key.len() + value.len() + 4);
        out.extend_from_slice(&dict[..insert_at]);
        out.extend_from_slice(format!("/{key} {value} ").as_bytes());
        out.extend_from_slice(&dict[insert_at..]);
        out
    }
}

// AcroForm dictionary with `field` appended to /Fields and /SigFlags 3
// asserted; other entries untouched. When /Fields is an indirect
// reference, the referenced array object is revised (pushed onto
// `objects`) and the dictionary entry itself is left alone.
fn updated_acro_form(
    doc: &Document,
    acro_dict: &[u8],
    field: u32,
    objects: &mut Vec<(u32, Vec<u8>)>,
) -> Result<Vec<u8>> {
    let with_fields = match dict_get(acro_dict, "Fields") {
        Some(fields) => match as_reference(fields) {
            Some(fields_obj) => {
                let array = array_object_of(doc, fields_obj)?;
                objects.push((fields_obj, push_array_item(&array, field)));
                acro_dict.to_vec()
            }
            None if fields.first() == Some(&b'[') => {
                let new_array = push_array_item(fields, field);
                replace_value(acro_dict, "Fields", &String::from_utf8_lossy(&new_array))
            }
            None => replace_value(acro_dict, "Fields", &format!("[{field} 0 R]")),
        },
        None => replace_value(acro_dict, "Fields", &format!("[{field} 0 R]")),
    };

    let with_flags = if dict_get(&with_fields, "SigFlags").is_none() {
        replace_value(&with_fields, "SigFlags", "3")
    } else {
        with_fields
    };

    Ok(if dict_get(&with_flags, "Type").is_none() {
        replace_value(&with_flags, "Type", "/AcroForm")
    } else {
        with_flags
    })
}

fn alloc(next: &mut u32) -> u32 {
    let n = *next;
    *next += 1;
    n
}

fn escape_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '(' => vec!['\\', '('],
            ')' => vec!['\\', ')'],
            '\\' => vec!['\\', '\\'],
            _ => vec![c],
        })
        .collect()
}

fn format_rect(rect: [f64; 4]) -> String {
    format!(
        "[{} {} {} {}]",
        trim_float(rect[0]),
        trim_float(rect[1]),
        trim_float(rect[2]),
        trim_float(rect[3])
    )
}

fn parse_rect(value: &[u8]) -> [f64; 4] {
    let items = array_items(value);
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        *slot = std::str::from_utf8(item)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0);
    }
    rect
}

pub(crate) fn trim_float(f: f64) -> String {
    if (f - f.round()).abs() < f64::EPSILON {
        format!("{}", f.round() as i64)
    } else {
        format!("{f:.2}")
    }
}
