//! Cross-reference container family: PDF documents.
//!
//! Images are stream objects reachable from page resources, addressed by
//! object id and possibly shared across pages. Each distinct id is decoded,
//! run through the shared pixel pipeline, and — when the JPEG shrinks the
//! stored stream by the required margin — replaced wholesale with a fresh
//! `/DCTDecode` image XObject. Replacing the whole object also drops a stale
//! `/SMask`: its transparency has already been flattened onto white.

use std::collections::HashSet;
use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::config::defaults::{MIN_PIXEL_AREA, SHRINK_MARGIN_PERCENT};
use crate::config::CompressionLevel;
use crate::error::{ContainerError, DecodeError, PatchError};
use crate::raster::recompress_pixels;

/// Recompress every image object in a PDF and return the rewritten document.
/// Per-image failures are logged and skipped; open or save failure fails the
/// whole level.
pub fn compress_pdf(input: &[u8], level: CompressionLevel) -> Result<Vec<u8>, ContainerError> {
    let mut doc = Document::load_mem(input)?;

    let handles = collect_document_images(&doc);
    log::debug!("Found {} distinct image objects", handles.len());

    for id in handles {
        if let Err(err) = patch_image_object(&mut doc, id, level) {
            log::warn!("Skipping image object {} {}: {}", id.0, id.1, err);
        }
    }

    finalize(doc)
}

/// Enumerate the distinct image objects referenced from any page, in page
/// order. An image placed on several pages yields one handle.
pub fn collect_document_images(doc: &Document) -> Vec<ObjectId> {
    let mut handles = Vec::new();
    let mut seen = HashSet::new();

    for (_, page_id) in doc.get_pages() {
        let page_dict = match doc.get_object(page_id) {
            Ok(Object::Dictionary(d)) => d.clone(),
            _ => continue,
        };
        let resources = page_resources(doc, &page_dict);
        for xobject_id in xobject_refs(doc, &resources) {
            collect_images_recursive(doc, xobject_id, &mut handles, &mut seen);
        }
    }

    handles
}

/// Page `/Resources`, walking up the `/Parent` chain for inherited entries.
/// The climb is depth-capped so a malformed parent cycle cannot loop.
fn page_resources(doc: &Document, page_dict: &Dictionary) -> Object {
    let mut node = page_dict.clone();
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resources.clone();
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => match doc.get_object(*parent_id) {
                Ok(Object::Dictionary(parent_dict)) => node = parent_dict.clone(),
                _ => break,
            },
            _ => break,
        }
    }
    Object::Null
}

/// Object ids listed in the `/XObject` table of a resources entry.
fn xobject_refs(doc: &Document, resources: &Object) -> Vec<ObjectId> {
    let mut refs = Vec::new();
    let Some(res_dict) = resolve_dict(doc, resources) else {
        return refs;
    };
    let Ok(xobjects) = res_dict.get(b"XObject") else {
        return refs;
    };
    let Some(xobject_dict) = resolve_dict(doc, xobjects) else {
        return refs;
    };
    for (_, value) in xobject_dict.iter() {
        if let Object::Reference(id) = value {
            refs.push(*id);
        }
    }
    refs
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Dictionary(d)) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

/// Descend into an XObject: images are collected once, Form XObjects are
/// searched for nested images.
fn collect_images_recursive(
    doc: &Document,
    id: ObjectId,
    handles: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    if !seen.insert(id) {
        return;
    }
    let Ok(Object::Stream(stream)) = doc.get_object(id) else {
        return;
    };
    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(n)) if n == b"Image" => handles.push(id),
        Ok(Object::Name(n)) if n == b"Form" => {
            if let Ok(resources) = stream.dict.get(b"Resources") {
                for child in xobject_refs(doc, resources) {
                    collect_images_recursive(doc, child, handles, seen);
                }
            }
        }
        _ => {}
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key) {
        Ok(Object::Integer(n)) => u32::try_from(*n).ok(),
        _ => None,
    }
}

fn first_filter_name(dict: &Dictionary) -> Option<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).to_string()),
        Ok(Object::Array(arr)) => arr.first().and_then(|f| match f {
            Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// Flate predictor parameters declared in `/DecodeParms`.
struct PredictorParams {
    predictor: u32,
    colors: u32,
    columns: u32,
    bits: u32,
}

fn predictor_params(doc: &Document, dict: &Dictionary) -> Option<PredictorParams> {
    let parms = dict.get(b"DecodeParms").ok()?;
    let parms = match parms {
        Object::Array(arr) => arr.iter().find_map(|entry| resolve_dict(doc, entry))?,
        other => resolve_dict(doc, other)?,
    };
    Some(PredictorParams {
        predictor: dict_u32(parms, b"Predictor").unwrap_or(1),
        colors: dict_u32(parms, b"Colors").unwrap_or(1),
        columns: dict_u32(parms, b"Columns").unwrap_or(1),
        bits: dict_u32(parms, b"BitsPerComponent").unwrap_or(8),
    })
}

/// Reverse the row predictor applied before Flate compression. Predictor 2
/// is TIFF horizontal differencing; 10..=15 are the PNG row filters, each
/// row prefixed with its filter tag byte.
fn undo_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>, DecodeError> {
    if params.predictor <= 1 {
        return Ok(data);
    }
    if params.bits != 8 {
        return Err(DecodeError::UnsupportedStream(format!(
            "predictor at {} bits per component",
            params.bits
        )));
    }
    let bpp = params.colors as usize;
    let row_len = params.columns as usize * bpp;
    if row_len == 0 {
        return Err(DecodeError::UnsupportedStream(
            "predictor with empty rows".to_string(),
        ));
    }

    match params.predictor {
        2 => {
            let mut data = data;
            for row in data.chunks_mut(row_len) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(data)
        }
        10..=15 => {
            let stride = row_len + 1;
            if data.len() % stride != 0 {
                return Err(DecodeError::UnsupportedStream(format!(
                    "predictor rows do not divide {} bytes",
                    data.len()
                )));
            }
            let mut out = Vec::with_capacity(data.len() / stride * row_len);
            let mut prev = vec![0u8; row_len];
            for chunk in data.chunks_exact(stride) {
                let mut row = chunk[1..].to_vec();
                unfilter_png_row(chunk[0], &mut row, &prev, bpp)?;
                out.extend_from_slice(&row);
                prev = row;
            }
            Ok(out)
        }
        other => Err(DecodeError::UnsupportedStream(format!("predictor {other}"))),
    }
}

fn unfilter_png_row(
    filter: u8,
    row: &mut [u8],
    prev: &[u8],
    bpp: usize,
) -> Result<(), DecodeError> {
    match filter {
        0 => {}
        1 => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        2 => {
            for i in 0..row.len() {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        3 => {
            for i in 0..row.len() {
                let left = if i >= bpp { u16::from(row[i - bpp]) } else { 0 };
                let average = ((left + u16::from(prev[i])) / 2) as u8;
                row[i] = row[i].wrapping_add(average);
            }
        }
        4 => {
            for i in 0..row.len() {
                let left = if i >= bpp { row[i - bpp] } else { 0 };
                let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                row[i] = row[i].wrapping_add(paeth(left, prev[i], up_left));
            }
        }
        other => {
            return Err(DecodeError::UnsupportedStream(format!(
                "predictor row filter {other}"
            )));
        }
    }
    Ok(())
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Recompress one image object in place. Rejections (icon floor, margin not
/// met) leave the object untouched and are not errors.
fn patch_image_object(
    doc: &mut Document,
    id: ObjectId,
    level: CompressionLevel,
) -> Result<(), PatchError> {
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(s)) => s.clone(),
        _ => return Ok(()),
    };

    let width = dict_u32(&stream.dict, b"Width").unwrap_or(0);
    let height = dict_u32(&stream.dict, b"Height").unwrap_or(0);
    if width == 0 || height == 0 {
        return Ok(());
    }
    if u64::from(width) * u64::from(height) < MIN_PIXEL_AREA {
        log::debug!("Object {} {}: below icon floor, keeping", id.0, id.1);
        return Ok(());
    }

    let mut img = decode_image_stream(doc, &stream, width, height)?;

    // Merge a soft-mask alpha channel so flattening sees the transparency
    if let Ok(Object::Reference(smask_id)) = stream.dict.get(b"SMask") {
        if let Ok(Object::Stream(smask)) = doc.get_object(*smask_id) {
            match decode_smask_stream(doc, smask, width, height) {
                Ok(alpha) => img = merge_alpha(&img, &alpha, width, height),
                Err(err) => log::debug!("Object {} {}: ignoring SMask: {}", id.0, id.1, err),
            }
        }
    }

    let (jpeg, new_width, new_height) = recompress_pixels(img, level)?;

    let stored_len = stream.content.len() as u64;
    let accepted = (jpeg.len() as u64) * 100 < stored_len * (100 - SHRINK_MARGIN_PERCENT);
    if !accepted {
        log::debug!(
            "Object {} {}: {} -> {} bytes, margin not met, keeping",
            id.0,
            id.1,
            stored_len,
            jpeg.len()
        );
        return Ok(());
    }

    log::info!(
        "Recompressed object {} {}: {}x{} -> {}x{}, {} -> {} bytes",
        id.0,
        id.1,
        width,
        height,
        new_width,
        new_height,
        stored_len,
        jpeg.len()
    );

    doc.objects
        .insert(id, Object::Stream(jpeg_image_stream(jpeg, new_width, new_height)));
    Ok(())
}

/// Build a complete `/DCTDecode` image XObject for the replacement bytes.
fn jpeg_image_stream(jpeg: Vec<u8>, width: u32, height: u32) -> Stream {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    Stream::new(dict, jpeg)
}

/// Decode a stored image stream into pixels. JPEG and JPEG2000 payloads go
/// through the image crate; Flate and raw payloads are interpreted against
/// the declared color space.
fn decode_image_stream(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
) -> Result<DynamicImage, DecodeError> {
    let content = &stream.content;

    let raw = match first_filter_name(&stream.dict).as_deref() {
        Some("DCTDecode") => {
            return Ok(image::load_from_memory_with_format(content, ImageFormat::Jpeg)?);
        }
        Some("JPXDecode") => return Ok(image::load_from_memory(content)?),
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&content[..]);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| DecodeError::UnsupportedStream(format!("FlateDecode: {e}")))?;
            match predictor_params(doc, &stream.dict) {
                Some(params) => undo_predictor(decoded, &params)?,
                None => decoded,
            }
        }
        None => content.clone(),
        Some(other) => {
            return Err(DecodeError::UnsupportedStream(other.to_string()));
        }
    };

    let bits = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(DecodeError::UnsupportedStream(format!(
            "{bits} bits per component"
        )));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .map(|cs| color_space_name(cs, doc))
        .unwrap_or_else(|_| "DeviceRGB".to_string());

    pixels_from_raw(raw, width, height, &color_space)
}

/// Interpret raw (decompressed) samples against a color-space name.
fn pixels_from_raw(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    color_space: &str,
) -> Result<DynamicImage, DecodeError> {
    let pixels = width as usize * height as usize;

    match color_space {
        "DeviceRGB" | "CalRGB" => {
            let want = pixels * 3;
            if raw.len() < want {
                return Err(short_stream(color_space, raw.len(), want));
            }
            RgbImage::from_raw(width, height, raw[..want].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| short_stream(color_space, 0, want))
        }
        "DeviceGray" | "CalGray" => {
            if raw.len() < pixels {
                return Err(short_stream(color_space, raw.len(), pixels));
            }
            GrayImage::from_raw(width, height, raw[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| short_stream(color_space, 0, pixels))
        }
        "DeviceCMYK" => {
            let want = pixels * 4;
            if raw.len() < want {
                return Err(short_stream(color_space, raw.len(), want));
            }
            let mut rgb = Vec::with_capacity(pixels * 3);
            for chunk in raw[..want].chunks_exact(4) {
                let k = f32::from(chunk[3]) / 255.0;
                for &component in &chunk[..3] {
                    let value = (1.0 - f32::from(component) / 255.0) * (1.0 - k);
                    rgb.push((value * 255.0) as u8);
                }
            }
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| short_stream(color_space, 0, want))
        }
        // No profile decoding; guess channel count from the data size
        "ICCBased" => {
            if raw.len() >= pixels * 3 {
                pixels_from_raw(raw, width, height, "DeviceRGB")
            } else if raw.len() >= pixels {
                pixels_from_raw(raw, width, height, "DeviceGray")
            } else {
                Err(short_stream(color_space, raw.len(), pixels))
            }
        }
        other => Err(DecodeError::UnsupportedStream(format!(
            "color space {other}"
        ))),
    }
}

fn short_stream(color_space: &str, got: usize, want: usize) -> DecodeError {
    DecodeError::UnsupportedStream(format!(
        "{color_space} stream holds {got} bytes, expected {want}"
    ))
}

fn color_space_name(obj: &Object, doc: &Document) -> String {
    match obj {
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
            _ => "Unknown".to_string(),
        },
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(resolved) => color_space_name(resolved, doc),
            Err(_) => "Unknown".to_string(),
        },
        _ => "Unknown".to_string(),
    }
}

/// Decode an `/SMask` stream into one alpha byte per pixel.
fn decode_smask_stream(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    let content = &stream.content;

    let decoded = match first_filter_name(&stream.dict).as_deref() {
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&content[..]);
            let mut data = Vec::new();
            decoder
                .read_to_end(&mut data)
                .map_err(|e| DecodeError::UnsupportedStream(format!("SMask FlateDecode: {e}")))?;
            match predictor_params(doc, &stream.dict) {
                Some(params) => undo_predictor(data, &params)?,
                None => data,
            }
        }
        Some("DCTDecode") => image::load_from_memory_with_format(content, ImageFormat::Jpeg)?
            .into_luma8()
            .into_raw(),
        None => content.clone(),
        Some(other) => {
            return Err(DecodeError::UnsupportedStream(format!("SMask filter {other}")));
        }
    };

    let want = width as usize * height as usize;
    if decoded.len() < want {
        return Err(short_stream("SMask", decoded.len(), want));
    }
    Ok(decoded[..want].to_vec())
}

/// Zip base pixels with a decoded alpha plane into an RGBA buffer.
fn merge_alpha(img: &DynamicImage, alpha: &[u8], width: u32, height: u32) -> DynamicImage {
    let rgb = img.to_rgb8();
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for (pixel, a) in rgb.pixels().zip(alpha.iter()) {
        rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], *a]);
    }
    match image::RgbaImage::from_raw(width, height, rgba) {
        Some(buffer) => DynamicImage::ImageRgba8(buffer),
        None => img.clone(),
    }
}

/// Garbage-collect unreferenced objects, renumber, compress streams, and
/// serialize the document.
fn finalize(mut doc: Document) -> Result<Vec<u8>, ContainerError> {
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    let mut output = Vec::new();
    doc.save_to(&mut output)?;
    Ok(output)
}
