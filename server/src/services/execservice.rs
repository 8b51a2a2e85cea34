use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use execlib::error::Error;
use execlib::types::{CancelOutcome, JobSpec};
use execlib::JobRegistry;
use execlib::OutputEvent as EngineOutput;
use protobuf::remote_exec_server::RemoteExec;
use protobuf::JobStatus as WireStatus;
use protobuf::{
    output_event, CancelRequest, CancelResponse, HealthRequest, HealthResponse, JobSummary,
    ListRequest, ListResponse, OutputEvent, ResultRequest, ResultResponse, StatusRequest,
    StatusResponse, StreamRequest, SubmitRequest, SubmitResponse,
};

pub struct RemoteExecService {
    registry: JobRegistry,
    started: Instant,
}

impl RemoteExecService {
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            registry,
            started: Instant::now(),
        }
    }
}

/// A string that is not a UUID cannot name a job, so it gets the same answer
/// an unknown id would.
fn parse_job_id(raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::not_found("Job not found"))
}

fn to_status(err: Error) -> Status {
    match err {
        Error::NotFound => Status::not_found("Job not found"),
        Error::Rejected(reason) => Status::invalid_argument(reason),
    }
}

fn wire_status(status: execlib::JobStatus) -> WireStatus {
    match status {
        execlib::JobStatus::Running => WireStatus::Running,
        execlib::JobStatus::Finished => WireStatus::Finished,
        execlib::JobStatus::Error => WireStatus::Error,
        execlib::JobStatus::Cancelled => WireStatus::Cancelled,
        execlib::JobStatus::Timeout => WireStatus::Timeout,
    }
}

#[tonic::async_trait]
impl RemoteExec for RemoteExecService {
    type StreamOutputStream = Pin<Box<dyn Stream<Item = Result<OutputEvent, Status>> + Send>>;

    async fn submit_job(
        &self,
        req: Request<SubmitRequest>,
    ) -> Result<Response<SubmitResponse>, Status> {
        let SubmitRequest {
            command,
            cwd,
            timeout_secs,
            env,
        } = req.into_inner();

        let mut spec = JobSpec::new(command);
        if !cwd.is_empty() {
            spec.cwd = Some(PathBuf::from(cwd));
        }
        if timeout_secs > 0 {
            spec.timeout = Some(Duration::from_secs(timeout_secs));
        }
        spec.env = env.into_iter().collect();

        let job_id = self.registry.submit(spec).await.map_err(to_status)?;
        Ok(Response::new(SubmitResponse {
            job_id: job_id.to_string(),
        }))
    }

    async fn query_status(
        &self,
        req: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let job_id = parse_job_id(&req.into_inner().job_id)?;
        let view = self.registry.status(job_id).await.map_err(to_status)?;
        Ok(Response::new(StatusResponse {
            job_id: view.id.to_string(),
            status: wire_status(view.status) as i32,
            command: view.command,
        }))
    }

    async fn get_result(
        &self,
        req: Request<ResultRequest>,
    ) -> Result<Response<ResultResponse>, Status> {
        let job_id = parse_job_id(&req.into_inner().job_id)?;
        let view = self.registry.result(job_id).await.map_err(to_status)?;
        Ok(Response::new(ResultResponse {
            job_id: view.id.to_string(),
            status: wire_status(view.status) as i32,
            stdout: view.stdout,
            returncode: view.returncode,
            error: view.error,
        }))
    }

    async fn stream_output(
        &self,
        req: Request<StreamRequest>,
    ) -> Result<Response<Self::StreamOutputStream>, Status> {
        let job_id = parse_job_id(&req.into_inner().job_id)?;
        let receiver = self.registry.stream(job_id).await.map_err(to_status)?;

        let output_stream = UnboundedReceiverStream::from(receiver);
        let response_stream = output_stream.map(|event| {
            let event = match event {
                EngineOutput::Line(line) => output_event::Event::Line(line),
                EngineOutput::Done(status) => {
                    output_event::Event::Done(wire_status(status) as i32)
                }
            };
            Ok(OutputEvent { event: Some(event) })
        });
        Ok(Response::new(
            Box::pin(response_stream) as Self::StreamOutputStream
        ))
    }

    async fn cancel_job(
        &self,
        req: Request<CancelRequest>,
    ) -> Result<Response<CancelResponse>, Status> {
        let job_id = parse_job_id(&req.into_inner().job_id)?;
        let outcome = self.registry.cancel(job_id).await.map_err(to_status)?;
        let message = match outcome {
            CancelOutcome::Cancelled => "Job cancelled".to_string(),
            CancelOutcome::AlreadyTerminal(status) => format!("Job is already {}", status),
        };
        Ok(Response::new(CancelResponse { message }))
    }

    async fn list_jobs(&self, _req: Request<ListRequest>) -> Result<Response<ListResponse>, Status> {
        let jobs = self
            .registry
            .list()
            .await
            .into_iter()
            .map(|summary| JobSummary {
                job_id: summary.id.to_string(),
                status: wire_status(summary.status) as i32,
                command: summary.command,
                created_at: summary.created_at,
            })
            .collect();
        Ok(Response::new(ListResponse { jobs }))
    }

    async fn health(&self, _req: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        let stats = self.registry.stats().await;
        Ok(Response::new(HealthResponse {
            status: "ok".to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            jobs_count: stats.jobs_count as u64,
        }))
    }
}
