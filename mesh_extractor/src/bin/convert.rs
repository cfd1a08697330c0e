use anyhow::{bail, Result};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(Level::INFO.into())
                    .from_env_lossy(),
            )
            .finish(),
    )?;

    let mut args = env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: convert_meshes <scene file or directory> [output directory]");
    };
    let output_dir: PathBuf = match args.next() {
        Some(output_dir) => output_dir.into(),
        None if Path::new(&input).is_dir() => input.clone().into(),
        None => Path::new(&input)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let converted = mesh_extractor::convert_all(&input, &output_dir).await?;
    tracing::info!("converted {} scene(s) into {output_dir:?}", converted.len());

    Ok(())
}
