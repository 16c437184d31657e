//! Hugging Face Hub dataset store.
//!
//! Speaks the Hub's public HTTP API with a bearer token:
//! - `GET  /api/whoami-v2`: credential check at startup
//! - `GET  /api/{type}s/{repo}/tree/{rev}?recursive=true`: paginated listing
//! - `POST /api/{type}s/{repo}/preupload/{rev}`: regular vs LFS upload mode
//! - `POST /{prefix}{repo}.git/info/lfs/objects/batch`: LFS upload actions
//! - `POST /api/{type}s/{repo}/commit/{rev}`: NDJSON commit
//!
//! Parquet outputs are binary, so the Hub asks for LFS in practice; the regular
//! (inline base64) path is kept for whatever else it accepts directly. LFS payloads
//! are streamed from the local file, never read whole into memory.

use super::{DatasetStore, StoreError};
use aggkline_core::PipelineConfig;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
const SAMPLE_BYTES: usize = 512;

#[derive(Debug, Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    oid: String,
    actions: Option<LfsActions>,
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletedPart {
    part_number: usize,
    etag: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_url: Option<String>,
}

/// One file operation inside a commit.
enum CommitOperation {
    Inline { path: String, content: String },
    Lfs { path: String, oid: String, size: u64 },
}

impl CommitOperation {
    fn to_ndjson(&self) -> serde_json::Value {
        match self {
            CommitOperation::Inline { path, content } => json!({
                "key": "file",
                "value": { "content": content, "path": path, "encoding": "base64" },
            }),
            CommitOperation::Lfs { path, oid, size } => json!({
                "key": "lfsFile",
                "value": { "path": path, "algo": "sha256", "oid": oid, "size": size },
            }),
        }
    }
}

/// Dataset store backed by a Hugging Face Hub repository.
pub struct HubStore {
    client: Client,
    endpoint: String,
    repo_id: String,
    repo_type: String,
    revision: String,
    token: String,
}

impl HubStore {
    pub fn new(config: &PipelineConfig, token: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("aggkline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            repo_id: config.repo_id.clone(),
            repo_type: config.repo_type.clone(),
            revision: config.revision.clone(),
            token: token.into(),
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Validate the token; returns the account name it belongs to.
    pub fn whoami(&self) -> Result<String, StoreError> {
        let url = format!("{}/api/whoami-v2", self.endpoint);
        let resp = self.send(self.authed(self.client.get(&url)), &url)?;
        let who: WhoAmI = resp
            .json()
            .map_err(|e| StoreError::Protocol(format!("whoami response: {e}")))?;
        Ok(who.name)
    }

    fn api_repo_url(&self) -> String {
        format!(
            "{}/api/{}s/{}",
            self.endpoint, self.repo_type, self.repo_id
        )
    }

    fn lfs_batch_url(&self) -> String {
        let prefix = match self.repo_type.as_str() {
            "dataset" => "datasets/",
            "space" => "spaces/",
            _ => "",
        };
        format!(
            "{}/{prefix}{}.git/info/lfs/objects/batch",
            self.endpoint, self.repo_id
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    /// Send a request and turn non-success statuses into `StoreError`s.
    fn send(&self, req: RequestBuilder, url: &str) -> Result<Response, StoreError> {
        let resp = req
            .send()
            .map_err(|e| StoreError::Transport(format!("{url}: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized(format!("{url}: {body}")));
        }
        Err(StoreError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }

    fn preupload(&self, path_in_repo: &str, size: u64, sample: &[u8]) -> Result<UploadMode, StoreError> {
        let url = format!("{}/preupload/{}", self.api_repo_url(), self.revision);
        let body = json!({
            "files": [{
                "path": path_in_repo,
                "size": size,
                "sample": BASE64.encode(sample),
            }]
        });

        let resp = self.send(self.authed(self.client.post(&url)).json(&body), &url)?;
        let parsed: PreuploadResponse = resp
            .json()
            .map_err(|e| StoreError::Protocol(format!("preupload response: {e}")))?;

        let file = parsed
            .files
            .into_iter()
            .find(|f| f.path == path_in_repo)
            .ok_or_else(|| {
                StoreError::Protocol(format!("preupload did not mention {path_in_repo}"))
            })?;

        if file.should_ignore {
            return Err(StoreError::Protocol(format!(
                "{path_in_repo} is ignored by the repository's .gitignore"
            )));
        }
        Ok(file.upload_mode)
    }

    fn lfs_upload(&self, oid: &str, local_path: &Path, size: u64) -> Result<(), StoreError> {
        let url = self.lfs_batch_url();
        let body = json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "objects": [{ "oid": oid, "size": size }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });

        let req = self
            .authed(self.client.post(&url))
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(body.to_string());
        let batch: LfsBatchResponse = self
            .send(req, &url)?
            .json()
            .map_err(|e| StoreError::Protocol(format!("LFS batch response: {e}")))?;

        let object = batch
            .objects
            .into_iter()
            .find(|o| o.oid == oid)
            .ok_or_else(|| StoreError::Protocol(format!("LFS batch did not mention {oid}")))?;

        if let Some(err) = object.error {
            return Err(StoreError::Protocol(format!(
                "LFS object {oid} rejected ({}): {}",
                err.code, err.message
            )));
        }

        // No actions: the hub already has this object.
        let Some(actions) = object.actions else {
            tracing::debug!(%oid, "LFS object already present");
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            if upload.header.contains_key("chunk_size") {
                self.lfs_multipart(oid, local_path, size, &upload)?;
            } else {
                let mut req = self.client.put(&upload.href).body(open(local_path)?);
                for (name, value) in &upload.header {
                    req = req.header(name.as_str(), value.as_str());
                }
                self.send(req, &upload.href)?;
            }
        }

        if let Some(verify) = actions.verify {
            let mut req = self
                .authed(self.client.post(&verify.href))
                .json(&json!({ "oid": oid, "size": size }));
            for (name, value) in &verify.header {
                req = req.header(name.as_str(), value.as_str());
            }
            self.send(req, &verify.href)?;
        }

        Ok(())
    }

    /// Multipart LFS upload: numbered header keys are presigned part URLs.
    fn lfs_multipart(
        &self,
        oid: &str,
        local_path: &Path,
        size: u64,
        upload: &LfsAction,
    ) -> Result<(), StoreError> {
        let chunk_size: u64 = upload
            .header
            .get("chunk_size")
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| StoreError::Protocol("invalid LFS chunk_size".into()))?;

        let mut part_urls: Vec<(usize, &str)> = upload
            .header
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|n| (n, v.as_str())))
            .collect();
        part_urls.sort_by_key(|(n, _)| *n);

        let part_count = size.div_ceil(chunk_size);
        if part_urls.len() as u64 != part_count {
            return Err(StoreError::Protocol(format!(
                "LFS multipart expects {} parts, file has {part_count}",
                part_urls.len()
            )));
        }

        let mut parts = Vec::with_capacity(part_urls.len());
        for (i, (part_number, part_url)) in part_urls.into_iter().enumerate() {
            let offset = i as u64 * chunk_size;
            let len = chunk_size.min(size - offset);
            let mut file = open(local_path)?;
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| io_error(local_path, e))?;
            let body = Body::sized(file.take(len), len);

            let resp = self.send(self.client.put(part_url).body(body), part_url)?;
            let etag = etag(resp.headers()).ok_or_else(|| {
                StoreError::Protocol(format!("part {part_number} response has no ETag"))
            })?;
            parts.push(CompletedPart { part_number, etag });
        }

        let completion = json!({ "oid": oid, "parts": parts });
        let req = self
            .client
            .post(&upload.href)
            .header(ACCEPT, LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(completion.to_string());
        self.send(req, &upload.href)?;
        Ok(())
    }

    fn commit(&self, summary: &str, operation: CommitOperation) -> Result<(), StoreError> {
        let url = format!("{}/commit/{}", self.api_repo_url(), self.revision);
        let header = json!({
            "key": "header",
            "value": { "summary": summary, "description": "" },
        });
        let body = format!("{header}\n{}\n", operation.to_ndjson());

        let resp = self.send(
            self.authed(self.client.post(&url))
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body),
            &url,
        )?;
        let commit: CommitResponse = resp
            .json()
            .map_err(|e| StoreError::Protocol(format!("commit response: {e}")))?;
        if let Some(commit_url) = commit.commit_url {
            tracing::debug!(%commit_url, "committed");
        }
        Ok(())
    }
}

impl DatasetStore for HubStore {
    fn list_files(&self) -> Result<Vec<String>, StoreError> {
        let mut files = Vec::new();
        let mut next = Some(format!(
            "{}/tree/{}?recursive=true&expand=false",
            self.api_repo_url(),
            self.revision
        ));

        while let Some(url) = next.take() {
            let resp = self.send(self.authed(self.client.get(&url)), &url)?;
            next = next_page(resp.headers());
            let entries: Vec<TreeEntry> = resp
                .json()
                .map_err(|e| StoreError::Protocol(format!("tree listing: {e}")))?;
            files.extend(
                entries
                    .into_iter()
                    .filter(|e| e.kind == "file")
                    .map(|e| e.path),
            );
        }

        Ok(files)
    }

    fn upload_file(
        &self,
        local_path: &Path,
        path_in_repo: &str,
        commit_message: &str,
    ) -> Result<(), StoreError> {
        let size = std::fs::metadata(local_path)
            .map_err(|e| io_error(local_path, e))?
            .len();
        let sample = read_sample(local_path)?;

        let operation = match self.preupload(path_in_repo, size, &sample)? {
            UploadMode::Regular => {
                let content = std::fs::read(local_path).map_err(|e| io_error(local_path, e))?;
                CommitOperation::Inline {
                    path: path_in_repo.to_string(),
                    content: BASE64.encode(&content),
                }
            }
            UploadMode::Lfs => {
                let oid = sha256_file(local_path)?;
                self.lfs_upload(&oid, local_path, size)?;
                CommitOperation::Lfs {
                    path: path_in_repo.to_string(),
                    oid,
                    size,
                }
            }
        };

        self.commit(commit_message, operation)?;
        tracing::info!(
            path = path_in_repo,
            repo = %self.repo_id,
            bytes = size,
            "uploaded to hub"
        );
        Ok(())
    }
}

fn io_error(path: &Path, err: io::Error) -> StoreError {
    StoreError::Io(format!("{}: {err}", path.display()))
}

fn open(path: &Path) -> Result<File, StoreError> {
    File::open(path).map_err(|e| io_error(path, e))
}

/// First `SAMPLE_BYTES` of the file; the Hub sniffs these to pick an upload mode.
fn read_sample(path: &Path) -> Result<Vec<u8>, StoreError> {
    let mut sample = Vec::with_capacity(SAMPLE_BYTES);
    open(path)?
        .take(SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)
        .map_err(|e| io_error(path, e))?;
    Ok(sample)
}

/// Lowercase hex sha256 of the file contents, streamed.
fn sha256_file(path: &Path) -> Result<String, StoreError> {
    let mut hasher = Sha256::new();
    io::copy(&mut open(path)?, &mut hasher).map_err(|e| io_error(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

fn etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        target
            .trim()
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(String::from)
    })
}
