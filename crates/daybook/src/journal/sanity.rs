//! Sanity の HTTP API クライアント。

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde_json::{Value, json};

use super::records::{CreatedDocument, ImageRef};
use super::store::{ContentStore, ImageUpload, QueryParams, StoreError};
use crate::config::SanityConfig;

/// Sanity API クライアント。
///
/// 読み取り用は `published` パースペクティブで、書き込み用は書き込みトークンで作る。
pub struct SanityClient {
    http: Client,
    /// `https://<project>.api.sanity.io/v<apiVersion>`
    base: String,
    dataset: String,
    token: Option<String>,
    perspective: Option<&'static str>,
}

impl SanityClient {
    /// 読み取り用のクライアントを作る。
    pub fn reader(config: &SanityConfig) -> Result<Self, StoreError> {
        let token = config.read_token.clone().filter(|t| !t.is_empty());
        Self::new(config, token, Some("published"))
    }

    /// 書き込み用のクライアントを作る。書き込みトークンがなければ `None`。
    pub fn writer(config: &SanityConfig) -> Result<Option<Self>, StoreError> {
        let Some(token) = config.write_token() else {
            return Ok(None);
        };
        Self::new(config, Some(token.to_string()), None).map(Some)
    }

    fn new(
        config: &SanityConfig,
        token: Option<String>,
        perspective: Option<&'static str>,
    ) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let base = format!(
            "https://{}.api.sanity.io/v{}",
            config.project_id, config.api_version
        );
        Ok(Self {
            http,
            base,
            dataset: config.dataset.clone(),
            token,
            perspective,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        let raw = format!("{}/{}/{}", self.base, path, self.dataset);
        Url::parse(&raw).map_err(|e| StoreError::Api {
            status: 0,
            message: format!("invalid API URL {raw}: {e}"),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn query_url(&self, query: &str, params: &QueryParams) -> Result<Url, StoreError> {
        let mut url = self.endpoint("data/query")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            for (key, value) in params.iter() {
                pairs.append_pair(&format!("${key}"), value);
            }
            if let Some(perspective) = self.perspective {
                pairs.append_pair("perspective", perspective);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ContentStore for SanityClient {
    async fn query(&self, query: &str, params: &QueryParams) -> Result<Value, StoreError> {
        let url = self.query_url(query, params)?;
        let response = self.authorize(self.http.get(url)).send().await?;
        let body = read_body(response).await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<ImageRef, StoreError> {
        let mut url = self.endpoint("assets/images")?;
        url.query_pairs_mut().append_pair("filename", &upload.filename);

        tracing::debug!(
            filename = %upload.filename,
            content_type = %upload.content_type,
            size = upload.data.len(),
            "Uploading image asset"
        );

        let request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, upload.content_type)
            .body(upload.data);
        let response = self.authorize(request).send().await?;
        let body = read_body(response).await?;
        parse_asset_id(&body).map(ImageRef::asset)
    }

    async fn create(&self, document: &Value) -> Result<CreatedDocument, StoreError> {
        let mut url = self.endpoint("data/mutate")?;
        url.query_pairs_mut().append_pair("returnDocuments", "true");

        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = json!({ "mutations": [{ "create": document }] });
        let response = self.authorize(self.http.post(url)).json(&payload).send().await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::AlreadyExists(id));
        }
        let body = read_body(response).await?;
        parse_created(&body)
    }
}

/// 2xx 以外を `StoreError::Api` に変換して JSON 本文を返す。
async fn read_body(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    Ok(serde_json::from_str(&text)?)
}

/// エラー本文から `error.description` を取り出す。なければ本文そのもの。
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/description")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string())
}

fn parse_asset_id(body: &Value) -> Result<String, StoreError> {
    body.pointer("/document/_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing_field("document._id"))
}

fn parse_created(body: &Value) -> Result<CreatedDocument, StoreError> {
    let document = body
        .pointer("/results/0/document")
        .ok_or_else(|| missing_field("results[0].document"))?;
    let id = document
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_field("_id"))?
        .to_string();
    let created_at = serde_json::from_value(
        document.get("_createdAt").cloned().unwrap_or(Value::Null),
    )?;
    Ok(CreatedDocument { id, created_at })
}

fn missing_field(name: &str) -> StoreError {
    StoreError::Api {
        status: 200,
        message: format!("response is missing {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config() -> SanityConfig {
        SanityConfig {
            project_id: "abcd1234".to_string(),
            write_token: Some("sk-write".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn builds_query_urls() {
        let client = SanityClient::reader(&config()).unwrap();
        let params = QueryParams::new().with("start", "2026-01-01");
        let url = client.query_url("*[_type == \"dayMark\"]", &params).unwrap();

        assert_eq!(url.host_str(), Some("abcd1234.api.sanity.io"));
        assert_eq!(url.path(), "/v2024-01-01/data/query/production");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "*[_type == \"dayMark\"]".to_string()),
                ("$start".to_string(), "\"2026-01-01\"".to_string()),
                ("perspective".to_string(), "published".to_string()),
            ]
        );
    }

    #[test]
    fn writer_requires_a_token() {
        assert!(SanityClient::writer(&config()).unwrap().is_some());

        let no_token = SanityConfig {
            write_token: None,
            ..config()
        };
        assert!(SanityClient::writer(&no_token).unwrap().is_none());

        let no_project = SanityConfig {
            project_id: String::new(),
            ..config()
        };
        assert!(SanityClient::writer(&no_project).unwrap().is_none());
    }

    #[test]
    fn writer_endpoints() {
        let client = SanityClient::writer(&config()).unwrap().unwrap();
        assert_eq!(client.perspective, None);
        assert_eq!(
            client.endpoint("assets/images").unwrap().path(),
            "/v2024-01-01/assets/images/production"
        );
        assert_eq!(
            client.endpoint("data/mutate").unwrap().path(),
            "/v2024-01-01/data/mutate/production"
        );
    }

    #[test]
    fn extracts_error_descriptions() {
        let body = r#"{"error":{"description":"Document already exists","type":"mutationError"}}"#;
        assert_eq!(error_message(body), "Document already exists");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn parses_mutation_results() {
        let body = json!({
            "transactionId": "tx1",
            "results": [{
                "id": "dayMark-2026-10-18-a1",
                "operation": "create",
                "document": {
                    "_id": "dayMark-2026-10-18-a1",
                    "_createdAt": "2026-10-18T09:15:00Z"
                }
            }]
        });
        let created = parse_created(&body).unwrap();
        assert_eq!(created.id, "dayMark-2026-10-18-a1");
        assert_eq!(
            created.created_at,
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 0).unwrap()
        );

        assert!(parse_created(&json!({ "results": [] })).is_err());
    }

    #[test]
    fn parses_asset_ids() {
        let body = json!({ "document": { "_id": "image-abc123-800x600-jpg" } });
        assert_eq!(parse_asset_id(&body).unwrap(), "image-abc123-800x600-jpg");
        assert!(parse_asset_id(&json!({})).is_err());
    }
}
