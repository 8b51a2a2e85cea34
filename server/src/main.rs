mod services;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use execlib::{EngineConfig, JobRegistry};
use protobuf::file_station_server::FileStationServer;
use protobuf::remote_exec_server::RemoteExecServer;
use services::execservice::RemoteExecService;
use services::filestation::FileStationService;

/// Remote command execution server
#[derive(Debug, Clone, Parser)]
pub struct ServerConfig {
    /// The address to listen on
    #[clap(long, default_value = "[::1]:50051")]
    pub listen: String,
    /// Default working directory for submitted commands
    #[clap(long, default_value = "/")]
    pub base_dir: PathBuf,
    /// Workspace root used for browsing, uploads and disk stats
    #[clap(long, default_value = "/workspace")]
    pub workspace_dir: PathBuf,
    /// Directory served by the file download endpoints
    #[clap(long, default_value = "/workspace/output")]
    pub files_dir: PathBuf,
    /// Default job timeout in seconds
    #[clap(long, default_value_t = 1200)]
    pub timeout_secs: u64,
    /// How long finished jobs are retained, in seconds
    #[clap(long, default_value_t = 3600)]
    pub retention_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    serve(config).await
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen.parse()?;

    let registry = JobRegistry::spawn(EngineConfig {
        base_dir: config.base_dir.clone(),
        default_timeout: Duration::from_secs(config.timeout_secs),
        retention: Duration::from_secs(config.retention_secs),
        ..EngineConfig::default()
    });
    let exec_service = RemoteExecService::new(registry);
    let file_service =
        FileStationService::new(config.workspace_dir.clone(), config.files_dir.clone());

    tracing::info!(%addr, "listening");
    Server::builder()
        .add_service(RemoteExecServer::new(exec_service))
        .add_service(FileStationServer::new(file_service))
        .serve(addr)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::file_station_client::FileStationClient;
    use protobuf::remote_exec_client::RemoteExecClient;
    use protobuf::{
        output_event, upload_request, BrowseRequest, CancelRequest, DiskUsageRequest,
        DownloadRequest, HealthRequest, JobStatus as WireStatus, ListFilesRequest, ListRequest,
        ResultRequest, ResultResponse, StatusRequest, StreamRequest, SubmitRequest, UploadMeta,
        UploadRequest,
    };
    use std::collections::HashMap;
    use tonic::transport::Channel;
    use tonic::Request;
    use uuid::Uuid;

    fn test_config(port: u16, workspace_dir: PathBuf, files_dir: PathBuf) -> ServerConfig {
        ServerConfig {
            listen: format!("[::1]:{}", port),
            base_dir: PathBuf::from("/tmp"),
            workspace_dir,
            files_dir,
            timeout_secs: 1200,
            retention_secs: 3600,
        }
    }

    /// Unique scratch dir per test so parallel tests never collide.
    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("remote-exec-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("failed to create scratch dir");
        dir
    }

    async fn start_server(config: ServerConfig) -> Channel {
        let endpoint = format!("http://{}", config.listen);
        tokio::spawn(async move {
            let _ = serve(config).await;
        });
        // wait for the listener to come up before clients connect
        for _ in 0..50 {
            let channel = Channel::from_shared(endpoint.clone())
                .expect("channel parse error")
                .connect()
                .await;
            if let Ok(channel) = channel {
                return channel;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("server did not start on {}", endpoint);
    }

    async fn submit(client: &mut RemoteExecClient<Channel>, command: &str) -> String {
        let response = client
            .submit_job(Request::new(SubmitRequest {
                command: command.to_string(),
                cwd: String::new(),
                timeout_secs: 0,
                env: HashMap::new(),
            }))
            .await
            .expect("bad submit response");
        response.into_inner().job_id
    }

    async fn wait_result(client: &mut RemoteExecClient<Channel>, job_id: &str) -> ResultResponse {
        for _ in 0..200 {
            let result = client
                .get_result(Request::new(ResultRequest {
                    job_id: job_id.to_string(),
                }))
                .await
                .expect("bad result response")
                .into_inner();
            if result.status != WireStatus::Running as i32 {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {} did not reach a terminal status", job_id);
    }

    #[tokio::test]
    async fn submit_echo_roundtrip() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50061, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let job_id = submit(&mut client, "echo hello").await;
        assert!(Uuid::parse_str(&job_id).is_ok());

        let status = client
            .query_status(Request::new(StatusRequest {
                job_id: job_id.clone(),
            }))
            .await
            .expect("bad status response")
            .into_inner();
        assert_eq!(status.command, "echo hello");
        assert!(
            status.status == WireStatus::Running as i32
                || status.status == WireStatus::Finished as i32
        );

        let result = wait_result(&mut client, &job_id).await;
        assert_eq!(result.status, WireStatus::Finished as i32);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.returncode, Some(0));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn stream_delivers_lines_then_terminal_marker() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50062, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let job_id = submit(&mut client, "echo alpha; echo beta").await;
        let mut stream = client
            .stream_output(Request::new(StreamRequest { job_id }))
            .await
            .expect("no stream response")
            .into_inner();

        let mut lines = vec![];
        let mut done = None;
        while let Some(event) = stream.message().await.expect("stream error") {
            match event.event {
                Some(output_event::Event::Line(line)) => lines.push(line),
                Some(output_event::Event::Done(status)) => done = Some(status),
                None => {}
            }
        }
        assert_eq!(lines, vec!["alpha", "beta"]);
        assert_eq!(done, Some(WireStatus::Finished as i32));
    }

    #[tokio::test]
    async fn blocked_command_is_rejected() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50063, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let response = client
            .submit_job(Request::new(SubmitRequest {
                command: "rm -rf /".to_string(),
                cwd: String::new(),
                timeout_secs: 0,
                env: HashMap::new(),
            }))
            .await;
        match response {
            Err(status) => {
                assert_eq!(status.code(), tonic::Code::InvalidArgument);
                assert!(status.message().starts_with("Blocked:"));
            }
            Ok(_) => panic!("dangerous command got Ok response!"),
        }

        let jobs = client
            .list_jobs(Request::new(ListRequest {}))
            .await
            .expect("bad list response")
            .into_inner()
            .jobs;
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_malformed_job_ids_are_not_found() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50064, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        for job_id in [Uuid::new_v4().to_string(), "not-a-job-id".to_string()] {
            let response = client
                .query_status(Request::new(StatusRequest { job_id }))
                .await;
            match response {
                Err(status) => {
                    assert_eq!(status.code(), tonic::Code::NotFound);
                    assert_eq!(status.message(), "Job not found");
                }
                Ok(_) => panic!("unknown job got Ok response!"),
            }
        }
    }

    #[tokio::test]
    async fn cancel_acknowledges_then_reports_terminal() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50065, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let job_id = submit(&mut client, "sleep 30").await;
        let ack = client
            .cancel_job(Request::new(CancelRequest {
                job_id: job_id.clone(),
            }))
            .await
            .expect("bad cancel response")
            .into_inner();
        assert_eq!(ack.message, "Job cancelled");

        let result = wait_result(&mut client, &job_id).await;
        assert_eq!(result.status, WireStatus::Cancelled as i32);

        let again = client
            .cancel_job(Request::new(CancelRequest { job_id }))
            .await
            .expect("bad cancel response")
            .into_inner();
        assert_eq!(again.message, "Job is already cancelled");
    }

    #[tokio::test]
    async fn list_preserves_submission_order() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50066, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let first = submit(&mut client, "echo a").await;
        let second = submit(&mut client, "echo b").await;

        let jobs = client
            .list_jobs(Request::new(ListRequest {}))
            .await
            .expect("bad list response")
            .into_inner()
            .jobs;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, first);
        assert_eq!(jobs[1].job_id, second);
        assert!(jobs.iter().all(|job| job.created_at > 0));
    }

    #[tokio::test]
    async fn health_reports_job_count() {
        let scratch = scratch_dir();
        let channel = start_server(test_config(50067, scratch.clone(), scratch)).await;
        let mut client = RemoteExecClient::new(channel);

        let health = client
            .health(Request::new(HealthRequest {}))
            .await
            .expect("bad health response")
            .into_inner();
        assert_eq!(health.status, "ok");
        assert_eq!(health.jobs_count, 0);

        submit(&mut client, "echo up").await;
        let health = client
            .health(Request::new(HealthRequest {}))
            .await
            .expect("bad health response")
            .into_inner();
        assert_eq!(health.jobs_count, 1);
    }

    #[tokio::test]
    async fn file_station_roundtrip() {
        let workspace = scratch_dir();
        let files = workspace.join("output");
        std::fs::create_dir_all(&files).expect("failed to create files dir");
        // a file outside the served root, reachable only by escaping it
        std::fs::write(workspace.join("secret.txt"), b"keep out").expect("write failed");

        let channel = start_server(test_config(50068, workspace.clone(), files.clone())).await;
        let mut client = FileStationClient::new(channel);

        // upload: metadata first, then chunks
        let payload: Vec<UploadRequest> = vec![
            UploadRequest {
                data: Some(upload_request::Data::Meta(UploadMeta {
                    dest_dir: files.display().to_string(),
                    filename: "result.bin".to_string(),
                })),
            },
            UploadRequest {
                data: Some(upload_request::Data::Chunk(b"hello ".to_vec())),
            },
            UploadRequest {
                data: Some(upload_request::Data::Chunk(b"world".to_vec())),
            },
        ];
        let uploaded = client
            .upload(tokio_stream::iter(payload))
            .await
            .expect("bad upload response")
            .into_inner();
        assert_eq!(uploaded.message, "File uploaded");
        assert_eq!(uploaded.size, 11);

        // the upload is visible to browse and the files listing
        let browse = client
            .browse(Request::new(BrowseRequest {
                path: files.display().to_string(),
            }))
            .await
            .expect("bad browse response")
            .into_inner();
        let entry = browse
            .entries
            .iter()
            .find(|entry| entry.name == "result.bin")
            .expect("uploaded file missing from browse");
        assert_eq!(entry.kind, "file");
        assert_eq!(entry.size, Some(11));

        let listed = client
            .list_files(Request::new(ListFilesRequest {}))
            .await
            .expect("bad list response")
            .into_inner()
            .files;
        assert!(listed.iter().any(|file| file.name == "result.bin"));

        // download round-trips the bytes
        let mut stream = client
            .download(Request::new(DownloadRequest {
                filename: "result.bin".to_string(),
            }))
            .await
            .expect("bad download response")
            .into_inner();
        let mut bytes = vec![];
        while let Some(chunk) = stream.message().await.expect("download stream error") {
            bytes.extend(chunk.data);
        }
        assert_eq!(bytes, b"hello world");

        // escaping the served root is rejected
        let escape = client
            .download(Request::new(DownloadRequest {
                filename: "../secret.txt".to_string(),
            }))
            .await;
        match escape {
            Err(status) => assert_eq!(status.code(), tonic::Code::PermissionDenied),
            Ok(_) => panic!("path escape got Ok response!"),
        }

        let disk = client
            .disk_usage(Request::new(DiskUsageRequest {}))
            .await
            .expect("bad disk response")
            .into_inner();
        assert!(disk.total_gb > 0.0);
        assert!(disk.total_gb >= disk.used_gb);
    }
}
