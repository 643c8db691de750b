//! 投稿された写真をアップロード用に整える。

use super::store::ImageUpload;

/// Content-Type が推定できないときの既定値
const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// フォームから受け取った写真ファイル。
#[derive(Debug, Clone, Default)]
pub struct PhotoFile {
    pub filename: String,
    /// フォームのパートに付いていた Content-Type
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl PhotoFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 写真をアップロード用の形に変換する。
///
/// HEIC/HEIF は `heic-support` 機能が有効なら JPEG に変換する。
/// 変換に失敗した場合は元のファイルをそのままアップロードする。
pub fn prepare_upload(photo: PhotoFile) -> ImageUpload {
    let filename = if photo.filename.trim().is_empty() {
        "photo.jpg".to_string()
    } else {
        photo.filename
    };
    let content_type = resolve_content_type(photo.content_type.as_deref(), &filename);

    if is_heic(&filename, &content_type) {
        #[cfg(feature = "heic-support")]
        match convert_heic_to_jpeg(&photo.data) {
            Ok(jpeg) => {
                return ImageUpload {
                    filename: replace_extension(&filename, "jpg"),
                    content_type: "image/jpeg".to_string(),
                    data: jpeg,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, filename = %filename, "Failed to convert HEIC to JPEG, uploading original");
            }
        }

        #[cfg(not(feature = "heic-support"))]
        tracing::debug!(filename = %filename, "HEIC conversion is disabled, uploading original");
    }

    ImageUpload {
        filename,
        content_type,
        data: photo.data,
    }
}

/// パートの Content-Type → 拡張子からの推定 → `image/jpeg` の順に決める。
fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => guess_content_type(filename).unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
    }
}

/// ファイル名の拡張子から Content-Type を推定する。
fn guess_content_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.to_string())
}

fn is_heic(filename: &str, content_type: &str) -> bool {
    let lower = filename.to_lowercase();
    [".heic", ".heif"].iter().any(|ext| lower.ends_with(ext))
        || matches!(content_type, "image/heic" | "image/heif")
}

/// ファイル名の拡張子を置き換える。
#[cfg_attr(not(feature = "heic-support"), allow(dead_code))]
fn replace_extension(filename: &str, new_ext: &str) -> String {
    if let Some(pos) = filename.rfind('.') {
        format!("{}.{}", &filename[..pos], new_ext)
    } else {
        format!("{}.{}", filename, new_ext)
    }
}

#[cfg(feature = "heic-support")]
fn convert_heic_to_jpeg(heic_data: &[u8]) -> anyhow::Result<Vec<u8>> {
    use std::io::Cursor;

    use anyhow::Context as _;
    use image::ImageReader;

    libheif_rs::integration::image::register_all_decoding_hooks();

    let img = ImageReader::new(Cursor::new(heic_data))
        .with_guessed_format()
        .context("Failed to create image reader")?
        .decode()
        .context("Failed to decode HEIC image")?;

    let mut jpeg_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut jpeg_data), image::ImageFormat::Jpeg)
        .context("Failed to encode image as JPEG")?;

    tracing::debug!(
        input_size = heic_data.len(),
        output_size = jpeg_data.len(),
        "HEIC to JPEG conversion succeeded"
    );

    Ok(jpeg_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(filename: &str, content_type: Option<&str>) -> PhotoFile {
        PhotoFile {
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            data: vec![0xff, 0xd8, 0xff],
        }
    }

    #[test]
    fn declared_content_type_wins() {
        let upload = prepare_upload(photo("river.png", Some("image/webp")));
        assert_eq!(upload.filename, "river.png");
        assert_eq!(upload.content_type, "image/webp");
        assert_eq!(upload.data, vec![0xff, 0xd8, 0xff]);
    }

    #[test]
    fn generic_content_type_is_guessed_from_name() {
        let upload = prepare_upload(photo("river.png", Some("application/octet-stream")));
        assert_eq!(upload.content_type, "image/png");

        let upload = prepare_upload(photo("river.gif", None));
        assert_eq!(upload.content_type, "image/gif");
    }

    #[test]
    fn falls_back_to_jpeg() {
        let upload = prepare_upload(photo("", None));
        assert_eq!(upload.filename, "photo.jpg");
        assert_eq!(upload.content_type, "image/jpeg");

        let upload = prepare_upload(photo("blob", Some("")));
        assert_eq!(upload.content_type, "image/jpeg");
    }

    #[test]
    fn detects_heic() {
        assert!(is_heic("IMG_0001.HEIC", "image/jpeg"));
        assert!(is_heic("upload", "image/heif"));
        assert!(!is_heic("imageheic", "image/png"));
    }

    #[cfg(not(feature = "heic-support"))]
    #[test]
    fn heic_is_uploaded_as_is_without_conversion() {
        let upload = prepare_upload(photo("IMG_0001.heic", None));
        assert_eq!(upload.filename, "IMG_0001.heic");
        assert_eq!(upload.content_type, "image/heic");
    }

    #[test]
    fn test_replace_extension() {
        assert_eq!(replace_extension("photo.heic", "jpg"), "photo.jpg");
        assert_eq!(replace_extension("my.photo.heic", "jpg"), "my.photo.jpg");
        assert_eq!(replace_extension("photo", "jpg"), "photo.jpg");
    }
}
