//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    // API keys from environment, as "owner=key" pairs (comma-separated)
    let api_keys = tally_server::parse_api_keys(&std::env::var("TALLY_API_KEYS").unwrap_or_default());

    // Parse Cloudflare Access JWT configuration
    let cf_team_name = std::env::var("CF_TEAM_NAME").ok().filter(|s| !s.is_empty());
    let cf_aud_tag = std::env::var("CF_AUD_TAG").ok().filter(|s| !s.is_empty());
    let cf_jwt_enabled = cf_team_name.is_some() && cf_aud_tag.is_some();

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        if cf_jwt_enabled {
            println!("   🔐 Authentication: Cloudflare Access (JWT validated)");
        } else {
            println!("   🔒 Authentication: Cloudflare Access (header only)");
            println!("      Set CF_TEAM_NAME and CF_AUD_TAG for cryptographic JWT validation");
        }
        if !api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured (TALLY_API_KEYS)",
                api_keys.len()
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = tally_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
        cf_jwt: tally_server::CfJwtConfig {
            team_name: cf_team_name,
            audience: cf_aud_tag,
        },
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    tally_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
