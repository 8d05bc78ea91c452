// 画像XObjectのネイティブ形式での取り出し

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, dictionary};

use crate::error::Pdf2ImgError;

/// A raster pulled out of a document page, still in its stored encoding.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// 1-based page number.
    pub page_number: u32,
    /// 1-based position among the page's images, in discovery order.
    pub image_index: u32,
    /// XObject resource name.
    pub name: String,
    pub encoded_bytes: Vec<u8>,
    /// File extension of `encoded_bytes` (`jpeg`, `jpx`, `jb2`, `png`).
    pub encoding: String,
}

/// 画像XObjectのメタデータ
#[derive(Debug, Clone)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ColorSpace,
}

/// 生ピクセルの解釈に必要な色空間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    fn components(self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// 画像ストリームを保存可能なバイト列と拡張子に変換する。
///
/// - DCTDecode / JPXDecode / JBIG2Decode: 格納されたバイト列をそのまま返す
///   (先行するFlateDecode等のラッパーのみ展開する)
/// - それ以外の生ピクセル: 単体で開ける形式がないため
///   ロスレスなPNGで包む
pub fn extract_native(
    doc: &Document,
    stream: &lopdf::Stream,
) -> crate::error::Result<(Vec<u8>, &'static str)> {
    let filters = filter_names(&stream.dict)?;

    let codec = filters.last().and_then(|last| match last.as_str() {
        "DCTDecode" => Some("jpeg"),
        "JPXDecode" => Some("jpx"),
        "JBIG2Decode" => Some("jb2"),
        _ => None,
    });

    if let Some(ext) = codec {
        let data = strip_wrappers(stream, &filters[..filters.len() - 1])?;
        return Ok((data, ext));
    }

    let meta = read_image_meta(doc, &stream.dict)?;
    check_decode_parms(doc, &stream.dict, &meta)?;
    let pixels = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|e| {
            Pdf2ImgError::image_xobject(format!(
                "Cannot decode image stream ({}): {e}",
                filters.join(", ")
            ))
        })?
    };
    let img = decode_raw(&pixels, &meta)?;
    Ok((encode_png(&img)?, "png"))
}

/// 符号化済み画像の手前にある汎用フィルタ層を展開する。
fn strip_wrappers(stream: &lopdf::Stream, wrappers: &[String]) -> crate::error::Result<Vec<u8>> {
    if wrappers.is_empty() {
        return Ok(stream.content.clone());
    }
    let names = wrappers
        .iter()
        .map(|f| Object::Name(f.as_bytes().to_vec()))
        .collect::<Vec<_>>();
    lopdf::Stream::new(dictionary! { "Filter" => names }, stream.content.clone())
        .decompressed_content()
        .map_err(|e| {
            Pdf2ImgError::image_xobject(format!(
                "Cannot unwrap {} layer(s): {e}",
                wrappers.join(", ")
            ))
        })
}

/// Filterエントリを名前の列として読む（単一名・配列の両方に対応）。
fn filter_names(dict: &lopdf::Dictionary) -> crate::error::Result<Vec<String>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Ok(vec![String::from_utf8_lossy(name).into_owned()]),
        Ok(Object::Array(arr)) => arr
            .iter()
            .map(|obj| match obj {
                Object::Name(name) => Ok(String::from_utf8_lossy(name).into_owned()),
                other => Err(Pdf2ImgError::image_xobject(format!(
                    "Expected filter name, got {:?}",
                    other
                ))),
            })
            .collect(),
        Ok(other) => Err(Pdf2ImgError::image_xobject(format!(
            "Unexpected Filter entry: {:?}",
            other
        ))),
        Err(_) => Ok(Vec::new()),
    }
}

/// 画像XObjectの辞書から画像メタデータを読み取る。
fn read_image_meta(doc: &Document, dict: &lopdf::Dictionary) -> crate::error::Result<ImageMeta> {
    let width = dict_get_u32(dict, b"Width")?;
    let height = dict_get_u32(dict, b"Height")?;
    let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

    // BitsPerComponent: missing keyの場合のみデフォルト8、ImageMaskは常に1
    let bits_per_component = if image_mask {
        1
    } else {
        match dict.get(b"BitsPerComponent") {
            Ok(_) => dict_get_u32(dict, b"BitsPerComponent")? as u8,
            Err(_) => 8,
        }
    };

    let color_space = if image_mask {
        ColorSpace::Gray
    } else {
        match dict.get(b"ColorSpace") {
            Ok(obj) => resolve_color_space(doc, obj)?,
            Err(_) => ColorSpace::Rgb,
        }
    };

    Ok(ImageMeta {
        width,
        height,
        bits_per_component,
        color_space,
    })
}

/// DecodeParmsのPNG予測子パラメータが画像辞書と一致することを確認する。
///
/// lopdfが予測子を解除するのは直接のDecodeParms辞書のみ。配列・間接参照の
/// 予測子はサポート外としてエラーにする。
fn check_decode_parms(
    doc: &Document,
    dict: &lopdf::Dictionary,
    meta: &ImageMeta,
) -> crate::error::Result<()> {
    let (parms, direct) = match dict.get(b"DecodeParms") {
        Ok(Object::Dictionary(d)) => (vec![d], true),
        Ok(Object::Array(arr)) => (arr.iter().filter_map(|o| resolve_dict(doc, o)).collect(), false),
        Ok(obj @ Object::Reference(_)) => (resolve_dict(doc, obj).into_iter().collect(), false),
        _ => return Ok(()),
    };

    for parms in parms {
        let int = |key: &[u8], default: i64| parms.get(key).and_then(Object::as_i64).unwrap_or(default);
        match int(b"Predictor", 1) {
            1 => continue,
            10..=15 if direct => {}
            other => {
                return Err(Pdf2ImgError::image_xobject(format!(
                    "Unsupported predictor: {}",
                    other
                )));
            }
        }

        let expected = (
            i64::from(meta.width),
            meta.color_space.components() as i64,
            i64::from(meta.bits_per_component),
        );
        let actual = (int(b"Columns", 1), int(b"Colors", 1), int(b"BitsPerComponent", 8));
        if actual != expected || meta.bits_per_component != 8 {
            return Err(Pdf2ImgError::image_xobject(format!(
                "Predictor parameters (Columns, Colors, BitsPerComponent) = {:?} do not match image {:?}",
                actual, expected
            )));
        }
    }
    Ok(())
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a lopdf::Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        other => other.as_dict().ok(),
    }
}

/// ColorSpaceオブジェクトを解決する。ICCBasedは成分数Nで判定する。
fn resolve_color_space(doc: &Document, obj: &Object) -> crate::error::Result<ColorSpace> {
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(Pdf2ImgError::image_xobject(format!(
                "Unsupported color space: {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Reference(id) => resolve_color_space(doc, doc.get_object(*id)?),
        Object::Array(arr) => {
            let family = arr
                .first()
                .and_then(|o| o.as_name().ok())
                .ok_or_else(|| Pdf2ImgError::image_xobject("Empty color space array"))?;
            match family {
                b"ICCBased" => {
                    let profile = match arr.get(1) {
                        Some(Object::Reference(id)) => doc.get_object(*id)?.as_stream()?,
                        Some(Object::Stream(s)) => s,
                        _ => {
                            return Err(Pdf2ImgError::image_xobject(
                                "ICCBased color space without profile stream",
                            ));
                        }
                    };
                    match profile.dict.get(b"N").and_then(Object::as_i64) {
                        Ok(1) => Ok(ColorSpace::Gray),
                        Ok(3) => Ok(ColorSpace::Rgb),
                        Ok(4) => Ok(ColorSpace::Cmyk),
                        _ => Err(Pdf2ImgError::image_xobject(
                            "ICCBased profile with unsupported component count",
                        )),
                    }
                }
                b"CalGray" => Ok(ColorSpace::Gray),
                b"CalRGB" => Ok(ColorSpace::Rgb),
                other => Err(Pdf2ImgError::image_xobject(format!(
                    "Unsupported color space family: {}",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        other => Err(Pdf2ImgError::image_xobject(format!(
            "Unexpected ColorSpace entry: {:?}",
            other
        ))),
    }
}

/// 辞書からu32値を取得するヘルパー（負の値はエラー）
fn dict_get_u32(dict: &lopdf::Dictionary, key: &[u8]) -> crate::error::Result<u32> {
    match dict.get(key) {
        Ok(Object::Integer(i)) => u32::try_from(*i).map_err(|_| {
            Pdf2ImgError::image_xobject(format!(
                "Value out of u32 range for {:?}: {}",
                String::from_utf8_lossy(key),
                i
            ))
        }),
        Ok(other) => Err(Pdf2ImgError::image_xobject(format!(
            "Expected integer for {:?}, got {:?}",
            String::from_utf8_lossy(key),
            other
        ))),
        Err(_) => Err(Pdf2ImgError::image_xobject(format!(
            "Missing required key: {:?}",
            String::from_utf8_lossy(key),
        ))),
    }
}

/// Raw pixelデータからDynamicImageを構築
fn decode_raw(data: &[u8], meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    let w = meta.width as usize;
    let h = meta.height as usize;
    if w == 0 || h == 0 {
        return Err(Pdf2ImgError::image_xobject(format!(
            "Empty image: {}x{}",
            w, h
        )));
    }

    match (meta.color_space, meta.bits_per_component) {
        (ColorSpace::Gray, 1) => {
            // 各行はバイト境界までパディングされる。ビット1が白。
            let stride = w.div_ceil(8);
            ensure_len(data, sample_count(&[stride, h])?, "1-bit gray")?;
            let mut gray = Vec::with_capacity(w * h);
            for row in data.chunks(stride).take(h) {
                for x in 0..w {
                    let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
                    gray.push(if bit == 1 { 255 } else { 0 });
                }
            }
            gray_image(gray, meta)
        }
        (cs, 8) => {
            let expected = sample_count(&[w, h, cs.components()])?;
            ensure_len(data, expected, "8-bit")?;
            let data = &data[..expected];
            match cs {
                ColorSpace::Gray => gray_image(data.to_vec(), meta),
                ColorSpace::Rgb => RgbImage::from_raw(meta.width, meta.height, data.to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| {
                        Pdf2ImgError::image_xobject("Failed to create RGB image from raw data")
                    }),
                ColorSpace::Cmyk => {
                    let rgb = data
                        .chunks_exact(4)
                        .flat_map(|px| {
                            let k = 255 - px[3] as u32;
                            [px[0], px[1], px[2]].map(|c| ((255 - c as u32) * k / 255) as u8)
                        })
                        .collect();
                    RgbImage::from_raw(meta.width, meta.height, rgb)
                        .map(DynamicImage::ImageRgb8)
                        .ok_or_else(|| {
                            Pdf2ImgError::image_xobject("Failed to create RGB image from CMYK data")
                        })
                }
            }
        }
        (cs, bpc) => Err(Pdf2ImgError::image_xobject(format!(
            "Unsupported color space / BPC combination: {:?} / {}",
            cs, bpc
        ))),
    }
}

/// 寸法の積。オーバーフローは壊れた画像辞書として扱う。
fn sample_count(dims: &[usize]) -> crate::error::Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            Pdf2ImgError::image_xobject(format!("Image dimensions overflow: {:?}", dims))
        })
}

fn ensure_len(data: &[u8], expected: usize, what: &str) -> crate::error::Result<()> {
    if data.len() < expected {
        return Err(Pdf2ImgError::image_xobject(format!(
            "{what} data too short: expected {}, got {}",
            expected,
            data.len()
        )));
    }
    Ok(())
}

fn gray_image(data: Vec<u8>, meta: &ImageMeta) -> crate::error::Result<DynamicImage> {
    GrayImage::from_raw(meta.width, meta.height, data)
        .map(DynamicImage::ImageLuma8)
        .ok_or_else(|| Pdf2ImgError::image_xobject("Failed to create Gray image from raw data"))
}

fn encode_png(img: &DynamicImage) -> crate::error::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Pdf2ImgError::image_xobject(format!("PNG encode error: {}", e)))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    #[test]
    fn test_dct_bytes_are_passed_through() {
        let doc = Document::with_version("1.5");
        let payload = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "Filter" => "DCTDecode",
            },
            payload.clone(),
        );
        let (bytes, ext) = extract_native(&doc, &stream).unwrap();
        assert_eq!(ext, "jpeg");
        assert_eq!(bytes, payload);
    }

    #[test]
    fn test_flate_wrapped_jpx_is_inflated() {
        let payload = b"jpx-codestream".to_vec();
        let wrapped = zlib(&payload);

        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "Filter" => vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"JPXDecode".to_vec())],
            },
            wrapped,
        );
        let (bytes, ext) = extract_native(&doc, &stream).unwrap();
        assert_eq!(ext, "jpx");
        assert_eq!(bytes, payload);
    }

    #[test]
    fn test_raw_gray_becomes_png() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 64, 128, 255],
        );
        let (bytes, ext) = extract_native(&doc, &stream).unwrap();
        assert_eq!(ext, "png");
        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.as_raw(), &vec![0, 64, 128, 255]);
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gray_stream(
        width: i64,
        height: i64,
        filter: &str,
        parms: Option<lopdf::Dictionary>,
        content: Vec<u8>,
    ) -> Stream {
        let mut dict = dictionary! {
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => filter,
        };
        if let Some(parms) = parms {
            dict.set("DecodeParms", parms);
        }
        Stream::new(dict, content)
    }

    #[test]
    fn test_flate_png_up_predictor_is_undone() {
        // 2 columns, 1 byte per pixel; row 1 uses "Up" (type 2)
        let parms = dictionary! {
            "Predictor" => 12,
            "Colors" => 1,
            "BitsPerComponent" => 8,
            "Columns" => 2,
        };
        let stream = gray_stream(2, 2, "FlateDecode", Some(parms), zlib(&[0, 10, 20, 2, 1, 1]));
        let (bytes, ext) = extract_native(&Document::with_version("1.5"), &stream).unwrap();
        assert_eq!(ext, "png");
        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.as_raw(), &vec![10, 20, 11, 21]);
    }

    #[test]
    fn test_ascii85_pixels_become_png() {
        // "z" is four zero bytes
        let stream = gray_stream(2, 2, "ASCII85Decode", None, b"z~>".to_vec());
        let (bytes, ext) = extract_native(&Document::with_version("1.5"), &stream).unwrap();
        assert_eq!(ext, "png");
        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.as_raw(), &vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_predictor_columns_must_match_width() {
        let parms = dictionary! {
            "Predictor" => 12,
            "Columns" => 1i64 << 50,
        };
        let stream = gray_stream(2, 2, "FlateDecode", Some(parms), zlib(&[0, 10, 20, 2, 1, 1]));
        assert!(matches!(
            extract_native(&Document::with_version("1.5"), &stream),
            Err(Pdf2ImgError::ImageXObjectError(_))
        ));
    }

    #[test]
    fn test_predictor_in_parms_array_is_rejected() {
        let mut stream = gray_stream(2, 2, "FlateDecode", None, zlib(&[0, 10, 20, 2, 1, 1]));
        let parms = dictionary! { "Predictor" => 12, "Columns" => 2 };
        stream.dict.set("DecodeParms", vec![Object::Dictionary(parms)]);
        assert!(matches!(
            extract_native(&Document::with_version("1.5"), &stream),
            Err(Pdf2ImgError::ImageXObjectError(_))
        ));
    }

    #[test]
    fn test_huge_dimensions_are_rejected_without_allocating() {
        let max = i64::from(u32::MAX);
        let mut stream = gray_stream(max, max, "FlateDecode", None, zlib(&[0, 0, 0]));
        stream.dict.set("ColorSpace", "DeviceRGB");
        assert!(matches!(
            extract_native(&Document::with_version("1.5"), &stream),
            Err(Pdf2ImgError::ImageXObjectError(_))
        ));

        let meta = ImageMeta {
            width: u32::MAX,
            height: u32::MAX,
            bits_per_component: 1,
            color_space: ColorSpace::Gray,
        };
        assert!(decode_raw(&[0; 4], &meta).is_err());
    }

    #[test]
    fn test_one_bit_rows_are_byte_padded() {
        let meta = ImageMeta {
            width: 3,
            height: 2,
            bits_per_component: 1,
            color_space: ColorSpace::Gray,
        };
        // row 0: 1 0 1 (pad), row 1: 0 1 0 (pad)
        let img = decode_raw(&[0b1010_0000, 0b0100_0000], &meta).unwrap();
        assert_eq!(img.to_luma8().as_raw(), &vec![255, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn test_cmyk_is_converted_to_rgb() {
        let meta = ImageMeta {
            width: 1,
            height: 1,
            bits_per_component: 8,
            color_space: ColorSpace::Cmyk,
        };
        let img = decode_raw(&[0, 255, 255, 0], &meta).unwrap();
        assert_eq!(img.to_rgb8().as_raw(), &vec![255, 0, 0]);
    }

    #[test]
    fn test_unsupported_filter_is_image_xobject_error() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "Filter" => "CCITTFaxDecode",
            },
            vec![0],
        );
        assert!(matches!(
            extract_native(&doc, &stream),
            Err(Pdf2ImgError::ImageXObjectError(_))
        ));
    }

    #[test]
    fn test_icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.5");
        let icc_id = doc.add_object(Stream::new(dictionary! { "N" => 1 }, vec![]));
        let cs = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), icc_id.into()]);
        assert_eq!(resolve_color_space(&doc, &cs).unwrap(), ColorSpace::Gray);
    }
}
