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

//! Reading the trailer, cross-reference chain, and object bodies of an
//! existing PDF.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::{
    pdf::object::{
        self, array_items, as_int, as_name, as_reference, dict_end, dict_get, find_from,
        find_last, object_header, scan_object_headers, skip_ws, type_priority,
    },
    Error, Result,
};

/// The fields of the last trailer in the file.
#[derive(Clone, Debug)]
pub struct Trailer {
    /// Object number of the document catalog.
    pub root: u32,

    /// The `/Size` entry: one past the highest object number in use.
    pub size: u32,

    /// Offset of the previous cross-reference section, if any.
    pub prev: Option<u64>,

    /// Offset of the last cross-reference section.
    pub startxref: u64,
}

/// Object number → absolute byte offset of the most recent definition.
#[derive(Clone, Debug, Default)]
pub struct XrefMap {
    map: HashMap<u32, u64>,
}

impl XrefMap {
    /// Offset of an object, if known.
    pub fn get(&self, num: u32) -> Option<u64> {
        self.map.get(&num).copied()
    }

    /// Number of known objects.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no objects are known.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The highest known object number.
    pub fn max_object_number(&self) -> u32 {
        self.map.keys().copied().max().unwrap_or(0)
    }
}

/// The resolved location of one indirect object.
#[derive(Clone, Debug)]
pub struct ObjectSlice {
    /// The object number.
    pub num: u32,

    /// Offset of the `N 0 obj` header.
    pub offset: usize,

    /// Span of the object's dictionary, including `<<`/`>>`.
    pub dict_start: usize,

    /// End (exclusive) of the object's dictionary.
    pub dict_end: usize,
}

/// Locate the last `startxref` and read the last trailer dictionary.
pub fn read_last_trailer(pdf: &[u8]) -> Result<Trailer> {
    let sx_pos = find_last(pdf, b"startxref")
        .ok_or_else(|| Error::PdfMalformed("no startxref found".to_string()))?;

    let num_start = skip_ws(pdf, sx_pos + b"startxref".len());
    let mut num_end = num_start;
    while num_end < pdf.len() && pdf[num_end].is_ascii_digit() {
        num_end += 1;
    }
    let startxref: u64 = std::str::from_utf8(&pdf[num_start..num_end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::PdfMalformed("startxref carries no offset".to_string()))?;

    let dict = match find_last(pdf, b"trailer") {
        Some(tr_pos) => {
            let dict_start = find_from(pdf, b"<<", tr_pos)
                .ok_or_else(|| Error::PdfMalformed("trailer without dictionary".to_string()))?;
            let end = dict_end(pdf, dict_start)
                .ok_or_else(|| Error::PdfMalformed("unbalanced trailer dictionary".to_string()))?;
            &pdf[dict_start..end]
        }
        None => {
            // No classical trailer keyword: best-effort read of the
            // dictionary of the object at startxref (cross-reference
            // stream input).
            let off = startxref as usize;
            let (_, _, body) = object_header(pdf, off)
                .ok_or_else(|| Error::PdfMalformed("no trailer found".to_string()))?;
            let dict_start = find_from(pdf, b"<<", body)
                .ok_or_else(|| Error::PdfMalformed("no trailer dictionary found".to_string()))?;
            let end = dict_end(pdf, dict_start)
                .ok_or_else(|| Error::PdfMalformed("unbalanced trailer dictionary".to_string()))?;
            &pdf[dict_start..end]
        }
    };

    let root = dict_get(dict, "Root")
        .and_then(as_reference)
        .ok_or_else(|| Error::PdfMalformed("trailer has no /Root".to_string()))?;
    let size = dict_get(dict, "Size")
        .and_then(as_int)
        .filter(|s| *s > 0)
        .ok_or_else(|| Error::PdfMalformed("trailer has no /Size".to_string()))? as u32;
    let prev = dict_get(dict, "Prev").and_then(as_int).map(|p| p as u64);

    Ok(Trailer {
        root,
        size,
        prev,
        startxref,
    })
}

/// Build the object map by walking classical xref tables along the `/Prev`
/// chain, newest first. The first definition seen for an object wins.
///
/// When the bytes at `startxref` are not a literal `xref` table, the whole
/// buffer is scanned for object headers instead.
pub fn build_xref_map(pdf: &[u8], startxref: u64) -> Result<XrefMap> {
    let mut map = XrefMap::default();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut next = Some(startxref);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            break;
        }

        let pos = skip_ws(pdf, offset as usize);
        if pdf.len() < pos + 4 || &pdf[pos..pos + 4] != b"xref" {
            warn!("no classical xref table at offset {offset}; scanning object bodies");
            scan_into_map(pdf, &mut map);
            break;
        }

        next = parse_xref_section(pdf, pos + 4, &mut map)?;
    }

    Ok(map)
}

// Parse subsections and the trailing trailer dictionary; returns /Prev.
fn parse_xref_section(pdf: &[u8], mut pos: usize, map: &mut XrefMap) -> Result<Option<u64>> {
    loop {
        pos = skip_ws(pdf, pos);
        if pos >= pdf.len() {
            return Err(Error::PdfMalformed(
                "cross-reference section ends without a trailer".to_string(),
            ));
        }

        if pdf[pos..].starts_with(b"trailer") {
            let dict_start = find_from(pdf, b"<<", pos)
                .ok_or_else(|| Error::PdfMalformed("trailer without dictionary".to_string()))?;
            let end = dict_end(pdf, dict_start)
                .ok_or_else(|| Error::PdfMalformed("unbalanced trailer dictionary".to_string()))?;
            let prev = dict_get(&pdf[dict_start..end], "Prev").and_then(as_int);
            return Ok(prev.map(|p| p as u64));
        }

        // Subsection header: start count
        let (start, count) = {
            let (start, p) = read_int(pdf, pos)
                .ok_or_else(|| Error::PdfMalformed("xref subsection header expected".to_string()))?;
            let (count, p) = read_int(pdf, skip_ws(pdf, p))
                .ok_or_else(|| Error::PdfMalformed("xref subsection count expected".to_string()))?;
            pos = skip_ws(pdf, p);
            (start as u32, count as usize)
        };

        for i in 0..count {
            let (offset, p) = read_int(pdf, pos)
                .ok_or_else(|| Error::PdfMalformed("xref entry offset expected".to_string()))?;
            let (_gen, p) = read_int(pdf, skip_ws(pdf, p))
                .ok_or_else(|| Error::PdfMalformed("xref entry generation expected".to_string()))?;
            let p = skip_ws(pdf, p);
            let kind = *pdf
                .get(p)
                .ok_or_else(|| Error::PdfMalformed("xref entry type expected".to_string()))?;

            let num = start + i as u32;
            if kind == b'n' && !map.map.contains_key(&num) {
                map.map.insert(num, offset as u64);
            }
            pos = skip_ws(pdf, p + 1);
        }
    }
}

fn read_int(pdf: &[u8], pos: usize) -> Option<(u64, usize)> {
    let mut end = pos;
    while end < pdf.len() && pdf[end].is_ascii_digit() {
        end += 1;
    }
    if end == pos {
        return None;
    }
    let value = std::str::from_utf8(&pdf[pos..end]).ok()?.parse().ok()?;
    Some((value, end))
}

// Populate the map from raw object headers; later definitions win.
fn scan_into_map(pdf: &[u8], map: &mut XrefMap) {
    for (num, offset) in scan_object_headers(pdf) {
        map.map.insert(num, offset as u64);
    }
}

/// Read an object by number. When the mapped offset does not hold the
/// requested header, falls back to a scan that prefers the highest-priority
/// `/Type` among same-numbered candidates.
pub fn read_object(pdf: &[u8], map: &XrefMap, num: u32) -> Result<ObjectSlice> {
    if let Some(offset) = map.get(num) {
        let off = offset as usize;
        if let Some((found, _gen, body)) = object_header(pdf, off) {
            if found == num {
                return slice_at(pdf, num, off, body);
            }
        }
    }

    warn!("object {num} not at its recorded offset; scanning");

    let mut best: Option<(u8, usize, usize)> = None;
    for (candidate, offset) in scan_object_headers(pdf) {
        if candidate != num {
            continue;
        }
        let Some((_, _, body)) = object_header(pdf, offset) else {
            continue;
        };
        let Ok(slice) = slice_at(pdf, num, offset, body) else {
            continue;
        };
        let priority = type_priority(&pdf[slice.dict_start..slice.dict_end]);
        // Later same-priority candidates shadow earlier ones.
        if best.map(|(p, _, _)| priority >= p).unwrap_or(true) {
            best = Some((priority, offset, body));
        }
    }

    match best {
        Some((_, offset, body)) => slice_at(pdf, num, offset, body),
        None => Err(Error::PdfMalformed(format!("object {num} not found"))),
    }
}

fn slice_at(pdf: &[u8], num: u32, offset: usize, body: usize) -> Result<ObjectSlice> {
    let dict_start = skip_ws(pdf, body);
    if !pdf[dict_start..].starts_with(b"<<") {
        return Err(Error::PdfMalformed(format!(
            "object {num} has no dictionary"
        )));
    }
    let end = dict_end(pdf, dict_start)
        .ok_or_else(|| Error::PdfMalformed(format!("object {num} has an unbalanced dictionary")))?;

    Ok(ObjectSlice {
        num,
        offset,
        dict_start,
        dict_end: end,
    })
}

/// A parsed PDF: the byte buffer plus its trailer and object map.
///
/// The parsed state lives exactly as long as the buffer; producing a new
/// buffer (every write operation does) means opening a new `Document`.
pub struct Document {
    bytes: Vec<u8>,
    trailer: Trailer,
    xref: XrefMap,
}

impl Document {
    /// Parse the trailer and cross-reference chain of `bytes`.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let trailer = read_last_trailer(&bytes)?;
        let xref = build_xref_map(&bytes, trailer.startxref)?;
        Ok(Self {
            bytes,
            trailer,
            xref,
        })
    }

    /// The underlying buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the document, returning the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The last trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// The object map.
    pub fn xref(&self) -> &XrefMap {
        &self.xref
    }

    /// Locate an object by number.
    pub fn object(&self, num: u32) -> Result<ObjectSlice> {
        read_object(&self.bytes, &self.xref, num)
    }

    /// The dictionary bytes of an object, including `<<`/`>>`.
    pub fn dict(&self, num: u32) -> Result<&[u8]> {
        let slice = self.object(num)?;
        Ok(&self.bytes[slice.dict_start..slice.dict_end])
    }

    /// The next free object number for an incremental update.
    pub fn next_object_number(&self) -> u32 {
        self.trailer.size.max(self.xref.max_object_number() + 1)
    }

    /// Resolve `/Root./Pages` and return the first `/Type /Page` leaf.
    pub fn first_page(&self) -> Result<u32> {
        let root = self.dict(self.trailer.root)?;
        let pages = dict_get(root, "Pages")
            .and_then(as_reference)
            .ok_or_else(|| Error::PdfMalformed("catalog has no /Pages".to_string()))?;
        self.first_page_under(pages, 0)
    }

    fn first_page_under(&self, node: u32, depth: usize) -> Result<u32> {
        if depth > 64 {
            return Err(Error::PdfMalformed("page tree too deep".to_string()));
        }
        let dict = self.dict(node)?;
        match dict_get(dict, "Type").and_then(as_name) {
            Some(b"Page") => Ok(node),
            _ => {
                let kids = dict_get(dict, "Kids")
                    .map(array_items)
                    .unwrap_or_default();
                for kid in kids {
                    if let Some(num) = as_reference(kid) {
                        if let Ok(page) = self.first_page_under(num, depth + 1) {
                            return Ok(page);
                        }
                    }
                }
                Err(Error::PdfMalformed("no /Type /Page leaf found".to_string()))
            }
        }
    }

    /// Return the object number of the `index`-th page (zero-based),
    /// honoring `/Count` at intermediate nodes.
    pub fn page_by_index(&self, index: usize) -> Result<u32> {
        let root = self.dict(self.trailer.root)?;
        let pages = dict_get(root, "Pages")
            .and_then(as_reference)
            .ok_or_else(|| Error::PdfMalformed("catalog has no /Pages".to_string()))?;

        let mut remaining = index;
        self.page_by_index_under(pages, &mut remaining, 0)?
            .ok_or_else(|| Error::PdfMalformed(format!("page index {index} out of range")))
    }

    fn page_by_index_under(
        &self,
        node: u32,
        remaining: &mut usize,
        depth: usize,
    ) -> Result<Option<u32>> {
        if depth > 64 {
            return Err(Error::PdfMalformed("page tree too deep".to_string()));
        }
        let dict = self.dict(node)?;
        match dict_get(dict, "Type").and_then(as_name) {
            Some(b"Page") => {
                if *remaining == 0 {
                    Ok(Some(node))
                } else {
                    *remaining -= 1;
                    Ok(None)
                }
            }
            _ => {
                let kids: Vec<u32> = dict_get(dict, "Kids")
                    .map(array_items)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|kid| as_reference(kid))
                    .collect();

                for kid in kids {
                    let kid_dict = self.dict(kid)?;
                    let is_leaf =
                        dict_get(kid_dict, "Type").and_then(as_name) == Some(b"Page".as_ref());
                    if !is_leaf {
                        // Skip whole subtrees using their /Count.
                        if let Some(count) = dict_get(kid_dict, "Count").and_then(as_int) {
                            let count = count.max(0) as usize;
                            if *remaining >= count {
                                *remaining -= count;
                                continue;
                            }
                        }
                    }
                    if let Some(page) = self.page_by_index_under(kid, remaining, depth + 1)? {
                        return Ok(Some(page));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Iterate the AcroForm field references, if an AcroForm exists.
    ///
    /// Returns `(acroform_object, fields)` where `acroform_object` is
    /// `None` when the AcroForm dictionary lives inline in the catalog.
    pub fn acro_form_fields(&self) -> Result<Option<(Option<u32>, Vec<u32>)>> {
        let root = self.dict(self.trailer.root)?;
        let Some(value) = dict_get(root, "AcroForm") else {
            return Ok(None);
        };

        let (obj, dict_bytes): (Option<u32>, Vec<u8>) = match as_reference(value) {
            Some(num) => (Some(num), self.dict(num)?.to_vec()),
            None => (None, value.to_vec()),
        };

        let fields_value = match dict_get(&dict_bytes, "Fields") {
            Some(v) => v.to_vec(),
            None => return Ok(Some((obj, Vec::new()))),
        };

        let fields_array = match as_reference(&fields_value) {
            // The referenced object is a bare array, not a dictionary.
            Some(num) => {
                let off = self.xref.get(num).ok_or_else(|| {
                    Error::PdfMalformed(format!("fields array object {num} not found"))
                })? as usize;
                let (_, _, body) = object_header(&self.bytes, off).ok_or_else(|| {
                    Error::PdfMalformed(format!("fields array object {num} not found"))
                })?;
                let start = skip_ws(&self.bytes, body);
                let end = object::value_end(&self.bytes, start).ok_or_else(|| {
                    Error::PdfMalformed(format!("object {num} is not an array"))
                })?;
                self.bytes[start..end].to_vec()
            }
            None => fields_value,
        };

        let fields = array_items(&fields_array)
            .iter()
            .filter_map(|item| as_reference(item))
            .collect();

        Ok(Some((obj, fields)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::tests::test_utils::minimal_pdf;

    #[test]
    fn trailer_of_minimal_pdf() {
        let pdf = minimal_pdf();
        let trailer = read_last_trailer(&pdf).unwrap();
        assert_eq!(trailer.root, 1);
        assert!(trailer.prev.is_none());
        assert!(trailer.size >= 4);
    }

    #[test]
    fn xref_maps_all_objects() {
        let pdf = minimal_pdf();
        let trailer = read_last_trailer(&pdf).unwrap();
        let map = build_xref_map(&pdf, trailer.startxref).unwrap();
        for num in 1..trailer.size {
            let slice = read_object(&pdf, &map, num).unwrap();
            assert_eq!(slice.num, num);
        }
    }

    #[test]
    fn first_page_resolves() {
        let doc = Document::open(minimal_pdf()).unwrap();
        let page = doc.first_page().unwrap();
        let dict = doc.dict(page).unwrap();
        assert_eq!(dict_get(dict, "Type").and_then(as_name).unwrap(), b"Page");
        assert_eq!(doc.page_by_index(0).unwrap(), page);
        assert!(doc.page_by_index(1).is_err());
    }

    #[test]
    fn bad_offset_falls_back_to_scan() {
        let pdf = minimal_pdf();
        let trailer = read_last_trailer(&pdf).unwrap();
        let mut map = build_xref_map(&pdf, trailer.startxref).unwrap();
        // Poison one offset.
        let page = Document::open(minimal_pdf()).unwrap().first_page().unwrap();
        map.map.insert(page, 2);
        let slice = read_object(&pdf, &map, page).unwrap();
        assert_eq!(slice.num, page);
    }

    #[test]
    fn missing_startxref_is_malformed() {
        assert!(matches!(
            read_last_trailer(b"%PDF-1.7 nothing else"),
            Err(Error::PdfMalformed(_))
        ));
    }
}
