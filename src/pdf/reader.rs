use std::collections::HashSet;
use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::Pdf2ImgError;
use crate::pdf::image_xobject::{SourceImage, extract_native};

pub struct PdfReader {
    doc: Document,
}

/// ページから見つかった画像XObjectへの参照。
#[derive(Debug, Clone)]
pub struct ImageXObject<'a> {
    /// リソース辞書上のXObject名 (例: `Im1`)
    pub name: String,
    /// 間接参照の場合のオブジェクトID (直接埋め込みの場合はNone)
    pub id: Option<ObjectId>,
    pub stream: &'a lopdf::Stream,
}

impl<'a> ImageXObject<'a> {
    /// 画像ストリームを元のエンコーディングのまま取り出す。
    pub fn to_source_image(
        &self,
        doc: &Document,
        page_number: u32,
        image_index: u32,
    ) -> crate::error::Result<SourceImage> {
        let (encoded_bytes, encoding) = extract_native(doc, self.stream)?;
        Ok(SourceImage {
            page_number,
            image_index,
            name: self.name.clone(),
            encoded_bytes,
            encoding: encoding.to_string(),
        })
    }
}

impl PdfReader {
    /// PDFファイルを開いてPdfReaderを作成する。
    pub fn open(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| {
            Pdf2ImgError::document_open(format!("{}: {e}", path.display()))
        })?;
        Ok(Self { doc })
    }

    /// ページ番号(1-indexed)を昇順で返す。
    pub fn page_numbers(&self) -> Vec<u32> {
        self.doc.get_pages().keys().copied().collect()
    }

    /// 指定ページ(1-indexed)の画像XObjectを発見順に返す。
    ///
    /// ページのリソース辞書（親ページツリーから継承されたものも含む）を走査し、
    /// Form XObjectの内部リソースも再帰的に辿る。同じ画像オブジェクトは
    /// 1ページにつき1回だけ返す。
    pub fn page_images(&self, page_num: u32) -> crate::error::Result<Vec<ImageXObject<'_>>> {
        let page_id = self.get_page_id(page_num)?;
        let (resource_dict, resource_ids) = self.doc.get_page_resources(page_id)?;

        let mut walk = ImageWalk::default();

        if let Some(dict) = resource_dict {
            self.collect_images(dict, &mut walk)?;
        }
        for res_id in resource_ids {
            let dict = self.doc.get_dictionary(res_id)?;
            self.collect_images(dict, &mut walk)?;
        }

        Ok(walk.images)
    }

    /// `select` が真を返すページの画像を、ページ順・ページ内発見順に
    /// 遅延的に取り出す。
    ///
    /// ページの走査やストリームの取り出しに失敗した場合は、その要素だけが
    /// `Err` になり、後続の画像は引き続き返される。
    pub fn source_images_for<'a>(
        &'a self,
        select: impl Fn(u32) -> bool + 'a,
    ) -> impl Iterator<Item = Result<SourceImage, ImageFailure>> + 'a {
        self.page_numbers()
            .into_iter()
            .filter(move |&page_num| select(page_num))
            .flat_map(move |page_num| {
                let (images, listing_error) = match self.page_images(page_num) {
                    Ok(images) => (images, None),
                    Err(error) => (Vec::new(), Some(error)),
                };
                debug!(page = page_num, count = images.len(), "page images");

                let listing_error = listing_error.map(|error| {
                    Err(ImageFailure {
                        page_number: page_num,
                        image_index: None,
                        error,
                    })
                });
                listing_error
                    .into_iter()
                    .chain(images.into_iter().enumerate().map(move |(idx, xobject)| {
                        let image_index = idx as u32 + 1;
                        xobject
                            .to_source_image(&self.doc, page_num, image_index)
                            .map_err(|error| ImageFailure {
                                page_number: page_num,
                                image_index: Some(image_index),
                                error,
                            })
                    }))
            })
    }

    /// リソース辞書のXObjectエントリを走査し、Imageを収集、Formは再帰する。
    fn collect_images<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        walk: &mut ImageWalk<'a>,
    ) -> crate::error::Result<()> {
        let xobject_entry = match dict.get(b"XObject") {
            Ok(entry) => entry,
            Err(_) => return Ok(()), // XObjectエントリがない場合は何もしない
        };

        let xobject_dict = match xobject_entry {
            Object::Dictionary(d) => d,
            Object::Reference(id) => self.doc.get_object(*id).and_then(Object::as_dict)?,
            _ => return Ok(()),
        };

        for (name_bytes, value) in xobject_dict.iter() {
            let (id, stream) = match value {
                Object::Reference(id) => (Some(*id), self.doc.get_object(*id).and_then(Object::as_stream)?),
                Object::Stream(s) => (None, s),
                _ => continue,
            };

            let subtype = match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(subtype) => subtype,
                Err(_) => continue,
            };

            match subtype {
                b"Image" => {
                    if let Some(id) = id
                        && !walk.seen_images.insert(id)
                    {
                        continue;
                    }
                    walk.images.push(ImageXObject {
                        name: String::from_utf8_lossy(name_bytes).into_owned(),
                        id,
                        stream,
                    });
                }
                b"Form" => {
                    // 循環参照するFormは一度だけ辿る
                    if let Some(id) = id
                        && !walk.seen_forms.insert(id)
                    {
                        continue;
                    }
                    if let Some(form_resources) = self.form_resources(stream)? {
                        self.collect_images(form_resources, walk)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Form XObjectのResources辞書を返す（直接・間接参照の両方に対応）。
    fn form_resources<'a>(
        &'a self,
        stream: &'a lopdf::Stream,
    ) -> crate::error::Result<Option<&'a lopdf::Dictionary>> {
        match stream.dict.get(b"Resources") {
            Ok(Object::Dictionary(d)) => Ok(Some(d)),
            Ok(Object::Reference(id)) => Ok(Some(self.doc.get_dictionary(*id)?)),
            _ => Ok(None),
        }
    }

    /// ページ番号(1-indexed)からObjectIdを取得する。
    fn get_page_id(&self, page_num: u32) -> crate::error::Result<ObjectId> {
        let pages = self.doc.get_pages();
        pages.get(&page_num).copied().ok_or_else(|| {
            Pdf2ImgError::image_xobject(format!("page {} not found", page_num))
        })
    }
}

/// 1ページの走査、または1画像の取り出しに失敗したことを表す。
#[derive(Debug)]
pub struct ImageFailure {
    pub page_number: u32,
    /// 画像単位の失敗なら1始まりの番号、ページ走査の失敗ならNone
    pub image_index: Option<u32>,
    pub error: Pdf2ImgError,
}

impl ImageFailure {
    /// `P3` または `P3 image 2` の形式で失敗箇所を返す。
    pub fn location(&self) -> String {
        match self.image_index {
            Some(idx) => format!("P{} image {}", self.page_number, idx),
            None => format!("P{}", self.page_number),
        }
    }
}

#[derive(Default)]
struct ImageWalk<'a> {
    images: Vec<ImageXObject<'a>>,
    seen_images: HashSet<ObjectId>,
    seen_forms: HashSet<ObjectId>,
}
