use reqwest::header::AUTHORIZATION;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{info, trace};

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("request to Slack method {method} failed")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Slack method {method} returned error: {error}")]
    Api { method: &'static str, error: String },
    #[error("Slack rejected the upload of {filename} with status code: {status}")]
    Upload { filename: String, status: reqwest::StatusCode },
}

const GET_UPLOAD_URL: &str = "files.getUploadURLExternal";
const COMPLETE_UPLOAD: &str = "files.completeUploadExternal";
const POST_MESSAGE: &str = "chat.postMessage";

/// A file to attach to a Slack message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub content: Vec<u8>,
}

/// A thin client for the handful of Slack Web API methods the report needs.
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        Self { http: reqwest::Client::new(), token: token.into(), api_base }
    }

    /// Uploads `files` and shares them to `channel` in one message carrying
    /// `initial_comment`. This is Slack's external upload flow: reserve an
    /// upload URL per file, send the bytes there, then complete the upload
    /// against the channel.
    pub async fn upload_files(
        &self,
        channel: &str,
        files: &[FileUpload],
        initial_comment: &str,
    ) -> Result<(), SlackError> {
        #[derive(Deserialize)]
        struct UploadUrl {
            upload_url: String,
            file_id: String,
        }

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let length = file.content.len().to_string();
            let response = self
                .http
                .post(self.method_url(GET_UPLOAD_URL))
                .header(AUTHORIZATION, self.bearer())
                .form(&[("filename", file.filename.as_str()), ("length", length.as_str())])
                .send()
                .await
                .map_err(|source| SlackError::Http { method: GET_UPLOAD_URL, source })?;
            let UploadUrl { upload_url, file_id } =
                parse_response(GET_UPLOAD_URL, response).await?;
            trace!("reserved Slack upload {} for {}", file_id, file.filename);

            let response = self
                .http
                .post(&upload_url)
                .body(file.content.clone())
                .send()
                .await
                .map_err(|source| SlackError::Http { method: "file upload", source })?;
            if !response.status().is_success() {
                return Err(SlackError::Upload {
                    filename: file.filename.clone(),
                    status: response.status(),
                });
            }
            uploaded.push(json!({ "id": file_id, "title": file.filename }));
        }

        let response = self
            .http
            .post(self.method_url(COMPLETE_UPLOAD))
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({
                "files": uploaded,
                "channel_id": channel,
                "initial_comment": initial_comment,
            }))
            .send()
            .await
            .map_err(|source| SlackError::Http { method: COMPLETE_UPLOAD, source })?;
        let _: Value = parse_response(COMPLETE_UPLOAD, response).await?;

        info!("shared {} file(s) to Slack channel {}", files.len(), channel);
        Ok(())
    }

    /// Posts a plain message to `channel`.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), SlackError> {
        let response = self
            .http
            .post(self.method_url(POST_MESSAGE))
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|source| SlackError::Http { method: POST_MESSAGE, source })?;
        let _: Value = parse_response(POST_MESSAGE, response).await?;

        info!("posted message to Slack channel {}", channel);
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Slack answers most failures with HTTP 200 and `"ok": false`, so the body
/// decides success.
async fn parse_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackError> {
    let status = response.status();
    let body: Value = match response.json().await {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(SlackError::Api { method, error: format!("http status {status}") });
        }
        Err(source) => return Err(SlackError::Http { method, source }),
    };
    trace!("received response from {}: {}", method, body);

    if body["ok"].as_bool() != Some(true) {
        let error = body["error"].as_str().unwrap_or("unknown_error").to_owned();
        return Err(SlackError::Api { method, error });
    }
    serde_json::from_value(body)
        .map_err(|err| SlackError::Api { method, error: format!("unexpected response: {err}") })
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_partial_json, body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn uploads_file_then_completes_with_comment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files.getUploadURLExternal"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_string_contains("length=5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "upload_url": format!("{}/upload/F123", server.uri()),
                "file_id": "F123",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/F123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK - 5"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files.completeUploadExternal"))
            .and(body_partial_json(json!({
                "channel_id": "C1",
                "initial_comment": "hello",
                "files": [{ "id": "F123", "title": "report.xlsx" }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SlackClient::new("xoxb-test", server.uri());
        let files = [FileUpload { filename: "report.xlsx".to_string(), content: b"bytes".to_vec() }];
        client.upload_files("C1", &files, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn api_errors_surface_slack_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "channel_not_found" })),
            )
            .mount(&server)
            .await;

        let client = SlackClient::new("xoxb-test", server.uri());
        let err = client.post_message("C404", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            SlackError::Api { method: "chat.postMessage", ref error } if error == "channel_not_found"
        ));
    }
}
