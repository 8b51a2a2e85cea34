tonic::include_proto!("remoteexec");
