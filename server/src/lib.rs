//! Collections REST API: configuration, HTTP assembly, request extractors
//! and the resource routes.

pub mod access;
pub mod config;
pub mod extract;
pub mod http;
pub mod routes;
pub mod seed;
