pub mod auth;
pub mod http;
pub mod rest;
pub mod storage;
