//! reqwest を使った REST API クライアント
//!
//! ## 責務
//!
//! - Domain 層の `ChatHistoryApi` / `RoomMembershipApi` / `PostApi` / `MediaApi` を実装
//! - バックエンドのエラーボディ（`errorCode`）を `ApiError` に変換
//!
//! パスは次の通り（ベース URL は設定で与える）:
//!
//! ```text
//! GET    {base}/chat/{room}/{page}      履歴（isover / date ヘッダで新しい方向）
//! GET    {base}/room/{room}             ルーム情報
//! POST   {base}/room/{room}             参加
//! DELETE {base}/room/{room}             退出
//! DELETE {base}/posts/{room}            投稿削除
//! POST   {base}/media                   画像アップロード
//! ```

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;

use groupbuy_shared::time::{format_chat_date, get_timestamp_millis};

use crate::domain::{
    ApiError, ChatHistoryApi, HistoryEntry, ImageRef, MediaApi, PostApi, RoomId, RoomInfo,
    RoomMembershipApi, Timestamp,
};
use crate::infrastructure::dto::http::{ChatPageDto, ErrorBodyDto, RoomInfoDto, UploadResponseDto};

/// REST API クライアント
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// 認証ヘッダに載せるアクセストークンを設定
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.header(header::AUTHORIZATION, token.as_str()),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn fetch_page(&self, request: RequestBuilder) -> Result<Vec<HistoryEntry>, ApiError> {
        let response = self.execute(request).await?;
        let page: ChatPageDto = decode(response).await?;
        // 日時の読めない行は現在時刻として扱う。並び順はセッション側で補正される
        Ok(page.into_entries(Timestamp::new(get_timestamp_millis())))
    }
}

/// 成功レスポンスの JSON を読み込む
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(error_from_body(status, &body));
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// ボディを使わない成功レスポンスを確認する
async fn expect_success(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    Err(error_from_body(status, &body))
}

fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorBodyDto>(body) {
        Ok(error) => ApiError::from_code(&error.error_code, &error.error_description),
        Err(_) => ApiError::Server {
            code: status.as_u16().to_string(),
            description: status.canonical_reason().unwrap_or_default().to_string(),
        },
    }
}

#[async_trait]
impl ChatHistoryApi for HttpApiClient {
    async fn fetch_older(&self, room: &RoomId, page: u32) -> Result<Vec<HistoryEntry>, ApiError> {
        tracing::debug!("Fetching older chat page {} of room '{}'", page, room);
        let request = self.client.get(self.url(&format!("chat/{}/{}", room, page)));
        self.fetch_page(request).await
    }

    async fn fetch_after(
        &self,
        room: &RoomId,
        after: Timestamp,
        page: u32,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let date = format_chat_date(after.value());
        tracing::debug!(
            "Fetching chat page {} of room '{}' after {}",
            page,
            room,
            date
        );
        let request = self
            .client
            .get(self.url(&format!("chat/{}/{}", room, page)))
            .header("isover", "1")
            .header("date", date);
        self.fetch_page(request).await
    }
}

#[async_trait]
impl RoomMembershipApi for HttpApiClient {
    async fn join(&self, room: &RoomId) -> Result<(), ApiError> {
        let response = self
            .execute(self.client.post(self.url(&format!("room/{}", room))))
            .await?;
        expect_success(response).await
    }

    async fn exit(&self, room: &RoomId) -> Result<(), ApiError> {
        let response = self
            .execute(self.client.delete(self.url(&format!("room/{}", room))))
            .await?;
        expect_success(response).await
    }

    async fn room_info(&self, room: &RoomId) -> Result<RoomInfo, ApiError> {
        let response = self
            .execute(self.client.get(self.url(&format!("room/{}", room))))
            .await?;
        let info: RoomInfoDto = decode(response).await?;
        Ok(info.into())
    }
}

#[async_trait]
impl PostApi for HttpApiClient {
    async fn delete_post(&self, room: &RoomId) -> Result<(), ApiError> {
        let response = self
            .execute(self.client.delete(self.url(&format!("posts/{}", room))))
            .await?;
        expect_success(response).await
    }
}

#[async_trait]
impl MediaApi for HttpApiClient {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<ImageRef, ApiError> {
        let request = self
            .client
            .post(self.url("media"))
            .header(header::CONTENT_TYPE, "image/jpeg")
            .body(bytes);
        let response = self.execute(request).await?;
        let uploaded: UploadResponseDto = decode(response).await?;
        Ok(ImageRef::new(uploaded.uid))
    }
}
