use std::collections::HashMap;
use std::path::{Path, PathBuf};

use protobuf::file_station_client::FileStationClient;
use protobuf::remote_exec_client::RemoteExecClient;
use protobuf::{
    output_event, upload_request, BrowseRequest, CancelRequest, DiskUsageRequest, DownloadRequest,
    HealthRequest, JobStatus, ListFilesRequest, ListRequest, ResultRequest, StatusRequest,
    StreamRequest, SubmitRequest, UploadMeta, UploadRequest,
};
use tonic::transport::Channel;
use tonic::{Request, Status};

const UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

pub struct ClientCli {
    exec: RemoteExecClient<Channel>,
    files: FileStationClient<Channel>,
}

fn status_name(raw: i32) -> &'static str {
    match JobStatus::from_i32(raw) {
        Some(JobStatus::Running) => "running",
        Some(JobStatus::Finished) => "finished",
        Some(JobStatus::Error) => "error",
        Some(JobStatus::Cancelled) => "cancelled",
        Some(JobStatus::Timeout) => "timeout",
        _ => "unknown",
    }
}

impl ClientCli {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let channel = Channel::from_shared(server_addr.to_string())?
            .connect()
            .await?;
        Ok(Self {
            exec: RemoteExecClient::new(channel.clone()),
            files: FileStationClient::new(channel),
        })
    }

    pub async fn submit(
        &mut self,
        command: &str,
        cwd: Option<String>,
        timeout: Option<u64>,
        env: &[(String, String)],
    ) -> Result<(), Status> {
        let request = Request::new(SubmitRequest {
            command: command.to_string(),
            cwd: cwd.unwrap_or_default(),
            timeout_secs: timeout.unwrap_or(0),
            env: HashMap::from_iter(env.iter().cloned()),
        });
        let response = self.exec.submit_job(request).await?;
        println!("Started job id: {}", response.into_inner().job_id);
        Ok(())
    }

    pub async fn query_status(&mut self, job_id: String) -> Result<(), Status> {
        let response = self
            .exec
            .query_status(Request::new(StatusRequest { job_id }))
            .await?
            .into_inner();
        println!(
            "{}  {}  {}",
            response.job_id,
            status_name(response.status),
            response.command
        );
        Ok(())
    }

    pub async fn get_result(&mut self, job_id: String) -> Result<(), Status> {
        let response = self
            .exec
            .get_result(Request::new(ResultRequest { job_id }))
            .await?
            .into_inner();
        println!("status: {}", status_name(response.status));
        if let Some(returncode) = response.returncode {
            println!("returncode: {}", returncode);
        }
        if let Some(error) = response.error {
            println!("error: {}", error);
        }
        print!("{}", response.stdout);
        Ok(())
    }

    pub async fn stream_output(&mut self, job_id: String) -> Result<(), Status> {
        let mut stream = self
            .exec
            .stream_output(Request::new(StreamRequest { job_id }))
            .await?
            .into_inner();
        while let Some(event) = stream.message().await? {
            match event.event {
                Some(output_event::Event::Line(line)) => println!("{}", line),
                Some(output_event::Event::Done(status)) => {
                    eprintln!("-- job {}", status_name(status));
                }
                None => {}
            }
        }
        Ok(())
    }

    pub async fn cancel(&mut self, job_id: String) -> Result<(), Status> {
        let response = self
            .exec
            .cancel_job(Request::new(CancelRequest { job_id }))
            .await?;
        println!("{}", response.into_inner().message);
        Ok(())
    }

    pub async fn list(&mut self) -> Result<(), Status> {
        let response = self.exec.list_jobs(Request::new(ListRequest {})).await?;
        for job in response.into_inner().jobs {
            println!(
                "{}  {}  {}  {}",
                job.job_id,
                status_name(job.status),
                job.created_at,
                job.command
            );
        }
        Ok(())
    }

    pub async fn health(&mut self) -> Result<(), Status> {
        let response = self
            .exec
            .health(Request::new(HealthRequest {}))
            .await?
            .into_inner();
        println!(
            "status: {}  uptime: {}s  jobs: {}",
            response.status, response.uptime_secs, response.jobs_count
        );
        Ok(())
    }

    pub async fn browse(&mut self, path: Option<String>) -> Result<(), Status> {
        let response = self
            .files
            .browse(Request::new(BrowseRequest {
                path: path.unwrap_or_default(),
            }))
            .await?
            .into_inner();
        println!("{}:", response.path);
        for entry in response.entries {
            match entry.size {
                Some(size) => println!("  {:<8} {:>10}  {}", entry.kind, size, entry.name),
                None => println!("  {:<8} {:>10}  {}", entry.kind, "-", entry.name),
            }
        }
        Ok(())
    }

    pub async fn upload(
        &mut self,
        file: &Path,
        dest_dir: Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let filename = file
            .file_name()
            .ok_or("upload path has no filename")?
            .to_string_lossy()
            .into_owned();
        let bytes = tokio::fs::read(file).await?;

        let mut messages = vec![UploadRequest {
            data: Some(upload_request::Data::Meta(UploadMeta {
                dest_dir: dest_dir.unwrap_or_default(),
                filename,
            })),
        }];
        for chunk in bytes.chunks(UPLOAD_CHUNK_BYTES) {
            messages.push(UploadRequest {
                data: Some(upload_request::Data::Chunk(chunk.to_vec())),
            });
        }

        let response = self
            .files
            .upload(tokio_stream::iter(messages))
            .await?
            .into_inner();
        println!("{}: {} ({} bytes)", response.message, response.path, response.size);
        Ok(())
    }

    pub async fn download(
        &mut self,
        filename: String,
        out: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let out = out.unwrap_or_else(|| PathBuf::from(&filename));
        let mut stream = self
            .files
            .download(Request::new(DownloadRequest { filename }))
            .await?
            .into_inner();

        let mut bytes = vec![];
        while let Some(chunk) = stream.message().await? {
            bytes.extend(chunk.data);
        }
        tokio::fs::write(&out, &bytes).await?;
        println!("Wrote {} bytes to {}", bytes.len(), out.display());
        Ok(())
    }

    pub async fn list_files(&mut self) -> Result<(), Status> {
        let response = self
            .files
            .list_files(Request::new(ListFilesRequest {}))
            .await?;
        for file in response.into_inner().files {
            println!("{:>10}  {}", file.size, file.name);
        }
        Ok(())
    }

    pub async fn disk_usage(&mut self) -> Result<(), Status> {
        let response = self
            .files
            .disk_usage(Request::new(DiskUsageRequest {}))
            .await?
            .into_inner();
        println!(
            "total: {} GB  used: {} GB  free: {} GB",
            response.total_gb, response.used_gb, response.free_gb
        );
        Ok(())
    }
}
