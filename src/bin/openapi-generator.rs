//! Print the status API OpenAPI document, or write it to the path given as first argument.

use anyhow::Context;
use soiree_poll::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi()
        .to_pretty_json()
        .context("serializing OpenAPI document")?;

    match std::env::args().nth(1) {
        Some(path) => std::fs::write(&path, doc).with_context(|| format!("writing {path}"))?,
        None => println!("{doc}"),
    }
    Ok(())
}
