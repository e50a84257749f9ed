use std::path::PathBuf;

use rollforward::db;
use rollforward::error::Result;
use rollforward::settings::{expand_data_dir, load_settings, save_settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = expand_data_dir(&dir).to_string_lossy().to_string();
    }
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    db::open(&resolved)?;

    println!("Initialized rollforward at {}", resolved.display());
    Ok(())
}
