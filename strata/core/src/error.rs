// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Strata error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    io, result,
};

use futures::future::Aborted;

/// Result type alias for Strata operations.
pub type Result<T> = result::Result<T, StrataError>;

/// Strata error types for distributed query execution.
#[derive(Debug)]
pub enum StrataError {
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
    /// Configuration error with invalid settings.
    Configuration(String),
    /// Failure while decoding a serialized execution-block plan.
    PlanDecode(String),
    /// I/O operation error.
    IoError(io::Error),
    /// gRPC transport error.
    TonicError(tonic::transport::Error),
    /// gRPC status error.
    GrpcError(Box<tonic::Status>),
    /// gRPC connection failure.
    GrpcConnectionError(String),
    /// Tokio task join error.
    TokioError(tokio::task::JoinError),
    /// Operation was cancelled.
    Cancelled,
}

/// Creates a general Strata error from a string message.
pub fn strata_error(message: &str) -> StrataError {
    StrataError::General(message.to_owned())
}

impl From<String> for StrataError {
    fn from(e: String) -> Self {
        StrataError::General(e)
    }
}

impl From<io::Error> for StrataError {
    fn from(e: io::Error) -> Self {
        StrataError::IoError(e)
    }
}

impl From<tonic::transport::Error> for StrataError {
    fn from(e: tonic::transport::Error) -> Self {
        StrataError::TonicError(e)
    }
}

impl From<tonic::Status> for StrataError {
    fn from(e: tonic::Status) -> Self {
        StrataError::GrpcError(Box::new(e))
    }
}

impl From<tokio::task::JoinError> for StrataError {
    fn from(e: tokio::task::JoinError) -> Self {
        StrataError::TokioError(e)
    }
}

impl From<prost::DecodeError> for StrataError {
    fn from(e: prost::DecodeError) -> Self {
        StrataError::PlanDecode(e.to_string())
    }
}

impl From<Aborted> for StrataError {
    fn from(_: Aborted) -> Self {
        StrataError::Cancelled
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            StrataError::General(desc) => write!(f, "General error: {desc}"),
            StrataError::Internal(desc) => {
                write!(f, "Internal Strata error: {desc}")
            }
            StrataError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            StrataError::PlanDecode(desc) => {
                write!(f, "Plan decode error: {desc}")
            }
            StrataError::IoError(desc) => write!(f, "IO error: {desc}"),
            StrataError::TonicError(desc) => write!(f, "Tonic error: {desc}"),
            StrataError::GrpcError(desc) => write!(f, "Grpc error: {desc}"),
            StrataError::GrpcConnectionError(desc) => {
                write!(f, "Grpc connection error: {desc}")
            }
            StrataError::TokioError(desc) => write!(f, "Tokio join error: {desc}"),
            StrataError::Cancelled => write!(f, "Task cancelled"),
        }
    }
}

impl Error for StrataError {}
