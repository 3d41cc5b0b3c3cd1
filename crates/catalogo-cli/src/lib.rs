//! Catalogo CLI - Command-line interface for the Catalogo course search index
//!
//! This crate provides the CLI application that ties together all Catalogo components.

pub mod config;
pub mod ingest;
pub mod output;

pub use config::{Command, CompareTarget, Config, CourseRef, ExportFormat, TermsCommand};
