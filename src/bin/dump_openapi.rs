use std::fs;

/// Writes the OpenAPI document to the path given as the first argument,
/// `openapi.json` by default.
fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    let port = edu_journal::config::port_from_env()?;

    let doc = edu_journal::docs::build_openapi(port)?;
    fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {}", path);
    Ok(())
}
