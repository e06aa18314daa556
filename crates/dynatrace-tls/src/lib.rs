// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS setup for the reqwest clients that talk to Dynatrace tenants.

pub mod reqwest_adapter;

pub use reqwest_adapter::{create_reqwest_client_builder, prepare_client_provider, TlsVerification};
