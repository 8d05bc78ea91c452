use serde::Deserialize;

use crate::segment::regions::EdgePairing;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

/// One batch: a list of input paths sharing an output directory and
/// extraction settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub inputs: Vec<String>,
    pub output_dir: String,
    #[serde(default, deserialize_with = "deserialize_pages")]
    pub pages: Option<Vec<u32>>,
    pub prefix: Option<String>,
    pub start_index: Option<u32>,
    pub decompose: Option<bool>,
    pub std_threshold: Option<f64>,
    pub row_kernel_width: Option<usize>,
    pub col_kernel_width: Option<usize>,
    pub edge_pairing: Option<EdgePairing>,
}

/// ページ範囲文字列をパースしてページ番号のベクタに変換する。
///
/// 形式:
/// - 単一ページ: `"5"`
/// - 範囲: `"5-10"` (5, 6, 7, 8, 9, 10)
/// - 混合（カンマ区切り）: `"1, 3, 5-10, 15"`
///
/// 結果はソート済み・重複なし。ページ番号は1始まり。
pub fn parse_page_range(s: &str) -> crate::error::Result<Vec<u32>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(crate::error::Pdf2ImgError::config(
            "Page range cannot be empty",
        ));
    }

    let mut pages = Vec::new();

    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let (start, end) = match part.split_once('-') {
            Some((start_str, end_str)) => {
                (parse_page_number(start_str)?, parse_page_number(end_str)?)
            }
            None => {
                let page = parse_page_number(part)?;
                (page, page)
            }
        };

        if start > end {
            return Err(crate::error::Pdf2ImgError::config(format!(
                "Invalid page range: start ({start}) > end ({end})"
            )));
        }
        pages.extend(start..=end);
    }

    if pages.is_empty() {
        return Err(crate::error::Pdf2ImgError::config(
            "Page range resolved to empty set",
        ));
    }

    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

fn parse_page_number(s: &str) -> crate::error::Result<u32> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err(crate::error::Pdf2ImgError::config(
            "Page numbers start at 1, got 0",
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(crate::error::Pdf2ImgError::config(format!(
            "Invalid page number: '{}'",
            s.trim()
        ))),
    }
}

/// serdeのdeserialize_withで使用するページ範囲デシリアライザ
fn deserialize_pages<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| parse_page_range(&s).map_err(serde::de::Error::custom))
        .transpose()
}
