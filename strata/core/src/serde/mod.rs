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

//! Code generated from the Strata Protocol Buffer definition, plus the
//! plain-Rust mirror types and conversions used across the worker.
//!
//! The generated module is committed to the tree so that downstream builds do
//! not require PROTOC.

pub use generated::strata as protobuf;

/// Checked-in protobuf/tonic generated code.
pub mod generated;
/// Plain-Rust types exchanged with the query master, with proto conversions.
pub mod master;
