//! One-shot image resize
//!
//! Usage: `tessera-resize <src> <dest> <width> <height> [op] [sequence] [png|bmp]`
//!
//! `op` is 1 (meter strip), 2 (exact scale, default) or 3 (cover and crop).
//! A JSON config may be named in `TESSERA_CONFIG`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tessera::{Config, Shell};

fn arg<T: std::str::FromStr>(args: &[String], index: usize, name: &str, default: Option<T>) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match (args.get(index), default) {
        (Some(value), _) => value.parse().with_context(|| format!("invalid {name}: {value}")),
        (None, Some(default)) => Ok(default),
        (None, None) => bail!("missing {name}"),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        bail!("usage: tessera-resize <src> <dest> <width> <height> [op] [sequence] [png|bmp]");
    }

    let mut config = match std::env::var("TESSERA_CONFIG") {
        Ok(path) => Config::from_json_file(&path)?,
        Err(_) => Config::default(),
    };
    config.apply_env();
    tessera::init_logging(&config.log_filter);

    let width: u32 = arg(&args, 2, "width", None)?;
    let height: u32 = arg(&args, 3, "height", None)?;
    let op: i32 = arg(&args, 4, "op", Some(2))?;
    let sequence: u32 = arg(&args, 5, "sequence", Some(1))?;
    let image_type = args.get(6).map(String::as_str).unwrap_or("png");

    let shell = Shell::new(config).context("failed to start shell")?;
    loop {
        match shell.submit_resize(&args[0], &args[1], width, height, sequence, op, image_type) {
            0 => std::thread::sleep(Duration::from_millis(20)),
            1 => break,
            _ => bail!("resize of {} failed", args[0]),
        }
    }

    tracing::info!("wrote {}", args[1]);
    Ok(())
}
