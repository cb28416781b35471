#![forbid(unsafe_code)]

pub mod admin;
pub mod app;
pub mod cache;
pub mod catalog;
pub mod chatbot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod directory;
pub mod formats;
pub mod forms;
pub mod logging;
pub mod media;
pub mod reader;
pub mod routes;
pub mod search;
pub mod sheets;
pub mod stager;
pub mod store;
