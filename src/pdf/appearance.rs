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

//! Visible signature appearance: wraps a caller-supplied PNG stamp into
//! Image/SMask XObjects plus a Form XObject and attaches it as the
//! widget's normal appearance, optionally with text drawn over the image.

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};

use crate::{
    pdf::{
        reader::Document,
        writer::{append_update, trim_float, EnsuredField},
    },
    Error, Result,
};

// Raster channels split out of the stamp PNG.
struct Stamp {
    width: u32,
    height: u32,
    gray: bool,
    color: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Embed `png` as the widget's `/AP /N` appearance in one incremental
/// update and return the new buffer.
///
/// `text_lines` are drawn over the image in Helvetica, shrunk to fit the
/// widget rectangle.
pub fn embed_appearance(
    doc: &Document,
    ensured: &EnsuredField,
    png: &[u8],
    text_lines: &[String],
) -> Result<Vec<u8>> {
    let stamp = decode_png(png)?;

    let width = (ensured.rect[2] - ensured.rect[0]).abs();
    let height = (ensured.rect[3] - ensured.rect[1]).abs();
    if width <= 0.0 || height <= 0.0 {
        return Err(Error::Stamp(
            "visible appearance needs a non-empty rectangle".to_string(),
        ));
    }

    let mut next = doc.next_object_number();
    let mut objects: Vec<(u32, Vec<u8>)> = Vec::new();

    let smask_obj = match &stamp.alpha {
        Some(alpha) => {
            let num = next;
            next += 1;
            objects.push((num, smask_object(&stamp, alpha)?));
            Some(num)
        }
        None => None,
    };

    let image_obj = next;
    next += 1;
    objects.push((image_obj, image_object(&stamp, smask_obj)?));

    let font_obj = if text_lines.is_empty() {
        None
    } else {
        let num = next;
        next += 1;
        objects.push((
            num,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_vec(),
        ));
        Some(num)
    };

    let form_obj = next;
    objects.push((
        form_obj,
        form_object(width, height, image_obj, font_obj, text_lines),
    ));

    // Point the widget at the new appearance and re-assert its rectangle.
    let widget_dict = doc.dict(ensured.widget)?.to_vec();
    let with_ap = crate::pdf::writer::replace_value(
        &widget_dict,
        "AP",
        &format!("<< /N {form_obj} 0 R >>"),
    );
    let with_as = crate::pdf::writer::replace_value(&with_ap, "AS", "/N");
    let with_rect = crate::pdf::writer::replace_value(
        &with_as,
        "Rect",
        &format!(
            "[{} {} {} {}]",
            trim_float(ensured.rect[0]),
            trim_float(ensured.rect[1]),
            trim_float(ensured.rect[2]),
            trim_float(ensured.rect[3])
        ),
    );
    objects.push((ensured.widget, with_rect));

    Ok(append_update(doc, &objects).0)
}

fn decode_png(png: &[u8]) -> Result<Stamp> {
    let decoder = png::Decoder::new(png);
    let mut reader = decoder
        .read_info()
        .map_err(|e| Error::Stamp(format!("PNG decode failed: {e}")))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| Error::Stamp(format!("PNG decode failed: {e}")))?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(Error::Stamp("only 8-bit PNG stamps are supported".to_string()));
    }

    let (gray, color, alpha) = match info.color_type {
        png::ColorType::Grayscale => (true, buf, None),
        png::ColorType::Rgb => (false, buf, None),
        png::ColorType::GrayscaleAlpha => {
            let mut gray_plane = Vec::with_capacity(buf.len() / 2);
            let mut alpha_plane = Vec::with_capacity(buf.len() / 2);
            for px in buf.chunks_exact(2) {
                gray_plane.push(px[0]);
                alpha_plane.push(px[1]);
            }
            (true, gray_plane, Some(alpha_plane))
        }
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(buf.len() / 4 * 3);
            let mut alpha_plane = Vec::with_capacity(buf.len() / 4);
            for px in buf.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha_plane.push(px[3]);
            }
            (false, rgb, Some(alpha_plane))
        }
        other => {
            return Err(Error::Stamp(format!(
                "unsupported PNG color type {other:?}"
            )))
        }
    };

    Ok(Stamp {
        width: info.width,
        height: info.height,
        gray,
        color,
        alpha,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn image_object(stamp: &Stamp, smask: Option<u32>) -> Result<Vec<u8>> {
    let data = deflate(&stamp.color)?;
    let colorspace = if stamp.gray {
        "/DeviceGray"
    } else {
        "/DeviceRGB"
    };
    let smask_entry = smask
        .map(|s| format!(" /SMask {s} 0 R"))
        .unwrap_or_default();

    let mut body = format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Filter /FlateDecode{} /Length {} >>\nstream\n",
        stamp.width,
        stamp.height,
        colorspace,
        smask_entry,
        data.len()
    )
    .into_bytes();
    body.extend_from_slice(&data);
    body.extend_from_slice(b"\nendstream");
    Ok(body)
}

fn smask_object(stamp: &Stamp, alpha: &[u8]) -> Result<Vec<u8>> {
    let data = deflate(alpha)?;
    let mut body = format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
        stamp.width,
        stamp.height,
        data.len()
    )
    .into_bytes();
    body.extend_from_slice(&data);
    body.extend_from_slice(b"\nendstream");
    Ok(body)
}

fn form_object(
    width: f64,
    height: f64,
    image: u32,
    font: Option<u32>,
    text_lines: &[String],
) -> Vec<u8> {
    let mut content = format!(
        "q {w} 0 0 {h} 0 0 cm /Im0 Do Q\n",
        w = trim_float(width),
        h = trim_float(height)
    );

    if let Some(_font) = font {
        content.push_str(&text_ops(width, height, text_lines));
    }

    let font_entry = font
        .map(|f| format!(" /Font << /Helv {f} 0 R >>"))
        .unwrap_or_default();

    let mut body = format!(
        "<< /Type /XObject /Subtype /Form /FormType 1 /BBox [0 0 {w} {h}] /Resources << /XObject << /Im0 {image} 0 R >>{font_entry} >> /Length {len} >>\nstream\n",
        w = trim_float(width),
        h = trim_float(height),
        len = content.len()
    )
    .into_bytes();
    body.extend_from_slice(content.as_bytes());
    body.extend_from_slice(b"\nendstream");
    body
}

// Draw the lines bottom-aligned inside the padded rectangle, shrinking the
// font until every line fits.
fn text_ops(width: f64, height: f64, lines: &[String]) -> String {
    const PADDING: f64 = 4.0;

    let avail_w = (width - 2.0 * PADDING).max(1.0);
    let avail_h = (height - 2.0 * PADDING).max(1.0);

    let mut size = 10.0f64;
    loop {
        let widest = lines
            .iter()
            .map(|l| line_width(l, size))
            .fold(0.0f64, f64::max);
        let total_h = size * 1.2 * lines.len() as f64;
        if (widest <= avail_w && total_h <= avail_h) || size <= 2.0 {
            break;
        }
        size -= 0.5;
    }

    let mut ops = String::from("BT /Helv ");
    ops.push_str(&format!("{size:.1} Tf 0 g "));
    let mut y = PADDING + size * 1.2 * (lines.len() as f64 - 1.0);
    for line in lines {
        ops.push_str(&format!(
            "1 0 0 1 {x} {y} Tm ({text}) Tj ",
            x = trim_float(PADDING),
            y = trim_float(y),
            text = escape_text(line)
        ));
        y -= size * 1.2;
    }
    ops.push_str("ET\n");
    ops
}

fn escape_text(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '(' => vec!['\\', '('],
            ')' => vec!['\\', ')'],
            '\\' => vec!['\\', '\\'],
            c if c.is_ascii() => vec![c],
            _ => vec!['?'],
        })
        .collect()
}

// Width of a line in text space units at the given size, using the
// standard Helvetica widths (1000-unit glyph space) for WinAnsi ASCII.
fn line_width(line: &str, size: f64) -> f64 {
    let units: u32 = line.bytes().map(|b| helvetica_width(b) as u32).sum();
    units as f64 / 1000.0 * size
}

fn helvetica_width(b: u8) -> u16 {
    const WIDTHS: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
    ];

    if (0x20..=0x7e).contains(&b) {
        WIDTHS[(b - 0x20) as usize]
    } else {
        556
    }
}
