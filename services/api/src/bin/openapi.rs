//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the ElderCare Guard REST API.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use eldercare_api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let document = ApiDoc::openapi();
    let paths = document.paths.paths.len();
    std::fs::write(&output, document.to_pretty_json()?)?;
    println!("OpenAPI document with {} paths written to {}", paths, output.display());
    Ok(())
}
