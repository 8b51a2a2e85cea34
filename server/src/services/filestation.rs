use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use protobuf::file_station_server::FileStation;
use protobuf::{
    upload_request, BrowseRequest, BrowseResponse, DirEntry, DiskUsageRequest, DiskUsageResponse,
    DownloadRequest, FileChunk, FileInfo, ListFilesRequest, ListFilesResponse, UploadRequest,
    UploadResponse,
};

const DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

/// Workspace inspection and file transfer around the executed commands.
///
/// Browsing and uploads are deliberately unrestricted (the service is an
/// operator tool behind a trusted frontend); downloads are confined to the
/// configured files root so a crafted filename cannot walk the filesystem.
pub struct FileStationService {
    workspace_dir: PathBuf,
    files_dir: PathBuf,
}

impl FileStationService {
    pub fn new(workspace_dir: PathBuf, files_dir: PathBuf) -> Self {
        Self {
            workspace_dir,
            files_dir,
        }
    }
}

fn fs_status(err: std::io::Error, not_found: &str) -> Status {
    match err.kind() {
        std::io::ErrorKind::NotFound => Status::not_found(not_found),
        std::io::ErrorKind::PermissionDenied => Status::permission_denied("Permission denied"),
        _ => Status::internal(err.to_string()),
    }
}

fn to_gb(bytes: u64) -> f64 {
    (bytes as f64 / (1024u64.pow(3) as f64) * 100.0).round() / 100.0
}

/// Total/used/free bytes for the filesystem holding `path`.
fn disk_stats(path: &Path) -> Option<(u64, u64, u64)> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // Safety: statvfs is well-defined for a valid NUL-terminated path and an
    // out-pointer of the right type.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }
    let stat = unsafe { stat.assume_init() };
    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bavail as u64 * block_size;
    Some((total, total.saturating_sub(free), free))
}

#[tonic::async_trait]
impl FileStation for FileStationService {
    type DownloadStream = Pin<Box<dyn Stream<Item = Result<FileChunk, Status>> + Send>>;

    async fn browse(
        &self,
        req: Request<BrowseRequest>,
    ) -> Result<Response<BrowseResponse>, Status> {
        let raw = req.into_inner().path;
        let path = if raw.is_empty() {
            self.workspace_dir.clone()
        } else {
            PathBuf::from(raw)
        };

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|err| fs_status(err, "Path not found"))?;
        if !meta.is_dir() {
            return Err(Status::invalid_argument("Path is not a directory"));
        }

        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|err| fs_status(err, "Path not found"))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| fs_status(err, "Path not found"))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            // an unreadable entry is reported, not skipped
            match entry.metadata().await {
                Ok(meta) if meta.is_dir() => entries.push(DirEntry {
                    name,
                    kind: "dir".to_string(),
                    size: None,
                }),
                Ok(meta) => entries.push(DirEntry {
                    name,
                    kind: "file".to_string(),
                    size: Some(meta.len()),
                }),
                Err(_) => entries.push(DirEntry {
                    name,
                    kind: "unknown".to_string(),
                    size: None,
                }),
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Response::new(BrowseResponse {
            path: path.display().to_string(),
            entries,
        }))
    }

    async fn upload(
        &self,
        req: Request<Streaming<UploadRequest>>,
    ) -> Result<Response<UploadResponse>, Status> {
        let mut stream = req.into_inner();

        let first = stream
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("Empty upload stream"))?;
        let meta = match first.data {
            Some(upload_request::Data::Meta(meta)) => meta,
            _ => {
                return Err(Status::invalid_argument(
                    "First upload message must carry the file metadata",
                ))
            }
        };
        if meta.filename.is_empty() {
            return Err(Status::invalid_argument("Missing filename"));
        }

        let dest_dir = if meta.dest_dir.is_empty() {
            self.workspace_dir.clone()
        } else {
            PathBuf::from(&meta.dest_dir)
        };
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|err| fs_status(err, "Destination not found"))?;

        let file_path = dest_dir.join(&meta.filename);
        let mut file = tokio::fs::File::create(&file_path)
            .await
            .map_err(|err| fs_status(err, "Destination not found"))?;

        let mut size: u64 = 0;
        while let Some(msg) = stream.message().await? {
            match msg.data {
                Some(upload_request::Data::Chunk(chunk)) => {
                    size += chunk.len() as u64;
                    file.write_all(&chunk)
                        .await
                        .map_err(|err| fs_status(err, "Destination not found"))?;
                }
                _ => return Err(Status::invalid_argument("Unexpected metadata mid-stream")),
            }
        }
        file.flush()
            .await
            .map_err(|err| fs_status(err, "Destination not found"))?;

        tracing::info!(path = %file_path.display(), size, "file uploaded");
        Ok(Response::new(UploadResponse {
            message: "File uploaded".to_string(),
            path: file_path.display().to_string(),
            size,
        }))
    }

    async fn download(
        &self,
        req: Request<DownloadRequest>,
    ) -> Result<Response<Self::DownloadStream>, Status> {
        let filename = req.into_inner().filename;

        let root = tokio::fs::canonicalize(&self.files_dir)
            .await
            .map_err(|err| fs_status(err, "File not found"))?;
        let resolved = tokio::fs::canonicalize(root.join(&filename))
            .await
            .map_err(|err| fs_status(err, "File not found"))?;
        if !resolved.starts_with(&root) {
            return Err(Status::permission_denied("Invalid file path"));
        }
        let meta = tokio::fs::metadata(&resolved)
            .await
            .map_err(|err| fs_status(err, "File not found"))?;
        if !meta.is_file() {
            return Err(Status::not_found("File not found"));
        }

        let mut file = tokio::fs::File::open(&resolved)
            .await
            .map_err(|err| fs_status(err, "File not found"))?;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
            loop {
                match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = FileChunk {
                            data: buf[..n].to_vec(),
                        };
                        if tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(Status::internal(err.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::DownloadStream
        ))
    }

    async fn list_files(
        &self,
        _req: Request<ListFilesRequest>,
    ) -> Result<Response<ListFilesResponse>, Status> {
        let mut files = Vec::new();
        // a files root that does not exist yet lists as empty, matching a
        // fresh deployment
        if let Ok(mut dir) = tokio::fs::read_dir(&self.files_dir).await {
            while let Ok(Some(entry)) = dir.next_entry().await {
                if let Ok(meta) = entry.metadata().await {
                    if meta.is_file() {
                        files.push(FileInfo {
                            name: entry.file_name().to_string_lossy().into_owned(),
                            size: meta.len(),
                        });
                    }
                }
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Response::new(ListFilesResponse { files }))
    }

    async fn disk_usage(
        &self,
        _req: Request<DiskUsageRequest>,
    ) -> Result<Response<DiskUsageResponse>, Status> {
        let path = self.workspace_dir.clone();
        let stats = tokio::task::spawn_blocking(move || disk_stats(&path))
            .await
            .map_err(|err| Status::internal(format!("Disk stats task failed: {}", err)))?
            .ok_or_else(|| Status::internal("Failed to read filesystem statistics"))?;

        let (total, used, free) = stats;
        Ok(Response::new(DiskUsageResponse {
            total_gb: to_gb(total),
            used_gb: to_gb(used),
            free_gb: to_gb(free),
        }))
    }
}
