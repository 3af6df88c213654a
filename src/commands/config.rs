//! Config command handler.
//!
//! Contains the implementation of the `config` CLI command.

use codeintel_retention::config::{RetentionAppConfig, default_config_path};

/// Config command.
pub fn cmd_config(config: &RetentionAppConfig, show: bool) -> anyhow::Result<()> {
    if !show {
        println!("Use 'codeintel-retention config --show' to display configuration");
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();

    match default_config_path() {
        Some(path) => println!("Default Config File: {}", path.display()),
        None => println!("Default Config File: (unavailable)"),
    }
    println!("Database: {}", config.db_path().display());
    match config.repos_root() {
        Ok(root) => println!("Repositories Root: {}", root.display()),
        Err(_) => println!("Repositories Root: (not set)"),
    }
    match config.expirer_config() {
        Ok(expirer) => println!(
            "Expirer: every {}s, {} repositories/run, {} uploads/batch",
            expirer.interval.as_secs(),
            expirer.repository_batch_size,
            expirer.upload_batch_size
        ),
        Err(e) => println!("Expirer: not runnable ({e})"),
    }
    println!();

    print!("{}", config.to_toml_string()?);
    Ok(())
}
