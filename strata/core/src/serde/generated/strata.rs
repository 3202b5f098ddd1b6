/// /////////////////////////////////////////////////////////////////////////////////////////////////
/// Strata Worker / Query Master Protocol
/// /////////////////////////////////////////////////////////////////////////////////////////////////
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutionBlockId {
    #[prost(string, tag = "1")]
    pub query_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub seq: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskAttemptId {
    #[prost(message, optional, tag = "1")]
    pub block_id: ::core::option::Option<ExecutionBlockId>,
    #[prost(uint32, tag = "2")]
    pub task_id: u32,
    #[prost(uint32, tag = "3")]
    pub attempt: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskStatus {
    #[prost(message, optional, tag = "1")]
    pub attempt_id: ::core::option::Option<TaskAttemptId>,
    #[prost(enumeration = "TaskState", tag = "2")]
    pub state: i32,
    #[prost(float, tag = "3")]
    pub progress: f32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingParams {
    #[prost(message, optional, tag = "1")]
    pub block_id: ::core::option::Option<ExecutionBlockId>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingResult {}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateTaskStatusParams {
    #[prost(message, optional, tag = "1")]
    pub status: ::core::option::Option<TaskStatus>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateTaskStatusResult {}
/// A contiguous byte range of one shuffle output file.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Page {
    #[prost(uint64, tag = "1")]
    pub offset: u64,
    #[prost(uint32, tag = "2")]
    pub length: u32,
}
/// A row range of one page that was lost before it could be made durable.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FailureIntermediate {
    #[prost(uint64, tag = "1")]
    pub page_offset: u64,
    #[prost(uint32, tag = "2")]
    pub start_row_num: u32,
    #[prost(uint32, tag = "3")]
    pub end_row_num: u32,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntermediateEntry {
    #[prost(message, optional, tag = "1")]
    pub block_id: ::core::option::Option<ExecutionBlockId>,
    /// host:port of the pull server the partition can be fetched from
    #[prost(string, tag = "2")]
    pub host: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub task_id: i32,
    #[prost(int32, tag = "4")]
    pub attempt_id: i32,
    #[prost(uint32, tag = "5")]
    pub partition_id: u32,
    #[prost(uint64, tag = "6")]
    pub volume: u64,
    #[prost(message, repeated, tag = "7")]
    pub pages: ::prost::alloc::vec::Vec<Page>,
    #[prost(message, repeated, tag = "8")]
    pub failures: ::prost::alloc::vec::Vec<FailureIntermediate>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutionBlockReport {
    #[prost(message, optional, tag = "1")]
    pub block_id: ::core::option::Option<ExecutionBlockId>,
    #[prost(bool, tag = "2")]
    pub report_success: bool,
    #[prost(string, tag = "3")]
    pub report_error_message: ::prost::alloc::string::String,
    #[prost(uint32, tag = "4")]
    pub succeeded_tasks: u32,
    #[prost(message, repeated, tag = "5")]
    pub intermediate_entries: ::prost::alloc::vec::Vec<IntermediateEntry>,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DoneExecutionBlockResult {}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KillQueryParams {
    #[prost(string, tag = "1")]
    pub query_id: ::prost::alloc::string::String,
}
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KillQueryResult {}
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration
)]
#[repr(i32)]
pub enum TaskState {
    TaskPending = 0,
    TaskRunning = 1,
    TaskSucceeded = 2,
    TaskFailed = 3,
    TaskKilled = 4,
}
impl TaskState {
    /// String value of the enum field names used in the ProtoBuf definition.
    ///
    /// The values are not transformed in any way and thus are considered stable
    /// (if the ProtoBuf definition does not change) and safe for programmatic use.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            TaskState::TaskPending => "TASK_PENDING",
            TaskState::TaskRunning => "TASK_RUNNING",
            TaskState::TaskSucceeded => "TASK_SUCCEEDED",
            TaskState::TaskFailed => "TASK_FAILED",
            TaskState::TaskKilled => "TASK_KILLED",
        }
    }
    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "TASK_PENDING" => Some(Self::TaskPending),
            "TASK_RUNNING" => Some(Self::TaskRunning),
            "TASK_SUCCEEDED" => Some(Self::TaskSucceeded),
            "TASK_FAILED" => Some(Self::TaskFailed),
            "TASK_KILLED" => Some(Self::TaskKilled),
            _ => None,
        }
    }
}
/// Generated client implementations.
pub mod query_master_grpc_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::http::Uri;
    use tonic::codegen::*;
    /// Worker-to-master protocol: liveness pings, task progress updates,
    /// execution block completion reports and query kill notifications.
    #[derive(Debug, Clone)]
    pub struct QueryMasterGrpcClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl QueryMasterGrpcClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> QueryMasterGrpcClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }
        /// Compress requests with the given encoding.
        ///
        /// This requires the server to support it otherwise it might respond with an
        /// error.
        #[must_use]
        pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.send_compressed(encoding);
            self
        }
        /// Enable decompressing responses.
        #[must_use]
        pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.accept_compressed(encoding);
            self
        }
        /// Liveness signal sent while an execution block has no active tasks
        pub async fn ping(
            &mut self,
            request: impl tonic::IntoRequest<super::PingParams>,
        ) -> Result<tonic::Response<super::PingResult>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/strata.protobuf.QueryMasterGrpc/Ping",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
        /// Progress push for one task attempt whose state has changed
        pub async fn status_update(
            &mut self,
            request: impl tonic::IntoRequest<super::UpdateTaskStatusParams>,
        ) -> Result<tonic::Response<super::UpdateTaskStatusResult>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/strata.protobuf.QueryMasterGrpc/StatusUpdate",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
        /// Final report for a stopped execution block, including the shuffle
        /// intermediate layout produced on this worker
        pub async fn done_execution_block(
            &mut self,
            request: impl tonic::IntoRequest<super::ExecutionBlockReport>,
        ) -> Result<tonic::Response<super::DoneExecutionBlockResult>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/strata.protobuf.QueryMasterGrpc/DoneExecutionBlock",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
        /// Best-effort notification that a query cannot run on this worker
        pub async fn kill_query(
            &mut self,
            request: impl tonic::IntoRequest<super::KillQueryParams>,
        ) -> Result<tonic::Response<super::KillQueryResult>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/strata.protobuf.QueryMasterGrpc/KillQuery",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
}
