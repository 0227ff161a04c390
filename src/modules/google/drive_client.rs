use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ensure_success, parse_error, request_error, StorageApi};
use crate::core::error::Result;

const SERVICE: &str = "Drive";

/// Fields requested for every listed file
const FILE_FIELDS: &str =
    "nextPageToken, files(id, name, owners, fullFileExtension, permissions, webViewLink)";

/// Permission type that makes a file reachable by anyone with the link
const ANYONE: &str = "anyone";

/// File entry from the Drive `files.list` endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub full_file_extension: Option<String>,
    #[serde(default)]
    pub owners: Vec<RemoteOwner>,
    #[serde(default)]
    pub permissions: Vec<RemotePermission>,
    #[serde(default)]
    pub web_view_link: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOwner {
    pub email_address: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePermission {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RemotePermission {
    pub fn is_anyone(&self) -> bool {
        self.kind == ANYONE
    }
}

impl RemoteFile {
    /// A file is public when any of its permissions grants access to anyone
    pub fn is_public(&self) -> bool {
        self.permissions.iter().any(RemotePermission::is_anyone)
    }

    /// The owner a file is attributed to
    pub fn primary_owner(&self) -> Option<&RemoteOwner> {
        self.owners.first()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionsResponse {
    #[serde(default)]
    permissions: Vec<RemotePermission>,
}

/// Client for the Drive v3 REST API
pub struct DriveClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
    page_size: u32,
}

impl DriveClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: String,
        access_token: String,
        page_size: u32,
    ) -> Self {
        Self {
            http_client,
            base_url,
            access_token,
            page_size,
        }
    }

    async fn list_page(&self, page_token: Option<&str>) -> Result<FileListResponse> {
        let url = format!("{}/files", self.base_url);
        let page_size = self.page_size.to_string();
        let mut query = vec![("pageSize", page_size.as_str()), ("fields", FILE_FIELDS)];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        ensure_success(response, SERVICE)
            .await?
            .json::<FileListResponse>()
            .await
            .map_err(|e| parse_error(SERVICE, e))
    }
}

#[async_trait]
impl StorageApi for DriveClient {
    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(page_token.as_deref()).await?;
            debug!("Fetched {} files from Drive", page.files.len());
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!("Listed {} files from Drive", files.len());
        Ok(files)
    }

    async fn file_permissions(&self, file_id: &str) -> Result<Vec<RemotePermission>> {
        let url = format!(
            "{}/files/{}/permissions",
            self.base_url,
            urlencoding::encode(file_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "permissions(id, type)")])
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let body = ensure_success(response, SERVICE)
            .await?
            .json::<PermissionsResponse>()
            .await
            .map_err(|e| parse_error(SERVICE, e))?;

        Ok(body.permissions)
    }

    async fn delete_permission(&self, file_id: &str, permission_id: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/permissions/{}",
            self.base_url,
            urlencoding::encode(file_id),
            urlencoding::encode(permission_id)
        );

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        ensure_success(response, SERVICE).await?;

        info!("Deleted permission {} from file {}", permission_id, file_id);
        Ok(())
    }
}
